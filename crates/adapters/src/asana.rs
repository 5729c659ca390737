//! Asana adapter: task/project CRUD over the simulated Asana REST surface
//! (§4.6, §8 testable property 8 — `update_task` without `taskId` and
//! `create_task` without `projectId` are the canonical validation cases).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use pe_core::adapter::Adapter;
use pe_core::error::CoreResult;
use pe_core::IntegrationManager;
use pe_models::{AdapterMetadata, AuthStatus, EngineResult as Result};

use crate::base::ProviderBase;
use crate::http_client::HttpClient;
use crate::support::{
    api_error, missing_fields, missing_id, optional_str, required_action, required_str, synthetic_id,
    unknown_action, Pagination, DEFAULT_PROJECT_LIMIT, DEFAULT_TASK_LIMIT,
};

pub struct AsanaAdapter {
    base: ProviderBase,
}

impl AsanaAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "asana",
                integration_manager,
                http,
                vec!["default".to_string()],
            ),
        }
    }

    fn create_task(&self, payload: &Value) -> Result {
        let Some(project_id) = required_str(payload, "projectId") else {
            return missing_fields(&["projectId"]);
        };
        let Some(name) = required_str(payload, "name") else {
            return missing_fields(&["name"]);
        };
        let task_id = synthetic_id("task");
        Result::ok_with_data(
            "task created",
            json!({
                "taskId": task_id,
                "projectId": project_id,
                "name": name,
                "notes": optional_str(payload, "notes"),
            }),
        )
    }

    fn update_task(&self, payload: &Value) -> Result {
        let Some(task_id) = required_str(payload, "taskId") else {
            return missing_id("taskId");
        };
        Result::ok_with_data(
            "task updated",
            json!({ "taskId": task_id, "updated": true }),
        )
    }

    fn list_tasks(&self, payload: &Value) -> Result {
        let Some(project_id) = required_str(payload, "projectId") else {
            return missing_fields(&["projectId"]);
        };
        let page = Pagination::from_payload(payload, DEFAULT_TASK_LIMIT);
        let tasks: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "taskId": synthetic_id("task"), "projectId": project_id, "name": format!("task {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(tasks.len()) });
        data["tasks"] = json!(tasks);
        Result::ok_with_data("ok", data)
    }

    fn list_projects(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_PROJECT_LIMIT);
        let projects: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "projectId": synthetic_id("proj"), "name": format!("project {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(projects.len()) });
        data["projects"] = json!(projects);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for AsanaAdapter {
    fn tool(&self) -> &str {
        "asana"
    }

    async fn connect(&self, user_id: &str) -> CoreResult<AuthStatus> {
        self.base.connect(user_id).await
    }

    async fn is_connected(&self, user_id: &str) -> bool {
        self.base.is_connected(user_id).await
    }

    async fn disconnect(&self, user_id: &str) -> CoreResult<()> {
        self.base.disconnect(user_id).await
    }

    async fn send(&self, _agent_id: &str, _user_id: &str, payload: Value) -> Result {
        let Some(action) = required_action(&payload) else {
            return api_error("send requires an action", None);
        };
        match action {
            "create_task" => self.create_task(&payload),
            "update_task" => self.update_task(&payload),
            other => unknown_action(other),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        let payload = query.unwrap_or(json!({}));
        let Some(action) = required_action(&payload) else {
            return api_error("fetch requires an action", None);
        };
        match action {
            "list_tasks" => self.list_tasks(&payload),
            "list_projects" => self.list_projects(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "asana".to_string(),
            name: "Asana".to_string(),
            description: "Create and manage tasks in Asana.".to_string(),
            version: "1.0.0".to_string(),
            author: "plugin-engine".to_string(),
            scopes: self.base.default_scopes.clone(),
            config_schema: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pe_cache::memory::InMemoryCache;
    use pe_store::memory::InMemoryStore;
    use std::sync::Arc;

    fn adapter() -> AsanaAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        AsanaAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn create_task_without_project_id_is_missing_fields() {
        let a = adapter();
        let result = a
            .send("agent", "user", json!({ "action": "create_task", "name": "write tests" }))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn update_task_without_task_id_is_missing_id() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "update_task" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingId);
    }

    #[tokio::test]
    async fn create_task_succeeds_with_required_fields() {
        let a = adapter();
        let result = a
            .send(
                "agent",
                "user",
                json!({ "action": "create_task", "projectId": "p1", "name": "write tests" }),
            )
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "delete_everything" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::UnknownAction);
    }
}
