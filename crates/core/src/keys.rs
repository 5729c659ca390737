//! KV key-namespace builders (§6 "Persisted tables"). Centralized so every
//! subsystem constructs the same key shape for the same concept.

pub fn integration(user_id: &str, tool: &str) -> String {
    format!("integration:{user_id}:{tool}")
}

pub fn result(agent_id: &str, tool: &str, intent: &str) -> String {
    format!("result:{agent_id}:{tool}:{intent}")
}

pub fn scheduled_task(id: pe_models::Id) -> String {
    format!("scheduled_task:{id}")
}

pub fn error_count_tool(agent_id: &str, tool: &str) -> String {
    format!("error_count:{agent_id}:{tool}")
}

pub fn error_count_action(agent_id: &str, tool: &str, action: &str) -> String {
    format!("error_count:{agent_id}:{tool}:{action}")
}

pub fn context_map(agent_id: &str, tool: &str, context_key: &str) -> String {
    format!("context_map:{agent_id}:{tool}:{context_key}")
}

pub fn context_map_rev(agent_id: &str, tool: &str, external_id: &str) -> String {
    format!("context_map_rev:{agent_id}:{tool}:{external_id}")
}

pub fn fallback(tool: &str, agent_id: Option<&str>) -> String {
    match agent_id {
        Some(a) => format!("fallback:{tool}:{a}"),
        None => format!("fallback:{tool}"),
    }
}
