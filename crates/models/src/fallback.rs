/// The hard-coded last-resort fallback message, used when neither an
/// agent-scoped, tool-scoped, nor built-in-default entry exists.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "The agent encountered an issue while trying to complete this task.";

/// A stored `(tool, agentId?) -> message` entry. An agent-scoped entry
/// overrides a tool-scoped entry, which overrides the built-in default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackMessage {
    pub tool: String,
    pub agent_id: Option<String>,
    pub message: String,
}

impl FallbackMessage {
    /// The storage/cache key for this scope: `tool` or `tool:agentId`.
    pub fn scope_key(tool: &str, agent_id: Option<&str>) -> String {
        match agent_id {
            Some(a) => format!("{tool}:{a}"),
            None => tool.to_string(),
        }
    }
}
