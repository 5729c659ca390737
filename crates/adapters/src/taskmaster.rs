//! TaskMaster adapter: task and subtask operations over the simulated
//! TaskMaster REST surface (§4.6). TaskMaster models a flat task list with
//! optional parent/child nesting, distinct from Asana's project-scoped
//! tasks — `create_task` here takes no `projectId`, only an optional
//! `parentTaskId`.

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
    unknown_action, Pagination, DEFAULT_TASK_LIMIT,
};

pub struct TaskMasterAdapter {
    base: ProviderBase,
}

impl TaskMasterAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "taskmaster",
                integration_manager,
                http,
                vec!["default".to_string()],
            ),
        }
    }

    fn create_task(&self, payload: &Value) -> Result {
        let Some(title) = required_str(payload, "title") else {
            return missing_fields(&["title"]);
        };
        let task_id = synthetic_id("tm_task");
        Result::ok_with_data(
            "task created",
            json!({
                "taskId": task_id,
                "title": title,
                "parentTaskId": optional_str(payload, "parentTaskId"),
                "priority": optional_str(payload, "priority"),
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

    fn complete_task(&self, payload: &Value) -> Result {
        let Some(task_id) = required_str(payload, "taskId") else {
            return missing_id("taskId");
        };
        Result::ok_with_data(
            "task completed",
            json!({ "taskId": task_id, "status": "done" }),
        )
    }

    fn delete_task(&self, payload: &Value) -> Result {
        let Some(task_id) = required_str(payload, "taskId") else {
            return missing_id("taskId");
        };
        Result::ok_with_data(
            "task deleted",
            json!({ "taskId": task_id, "deleted": true }),
        )
    }

    fn list_tasks(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_TASK_LIMIT);
        let parent = optional_str(payload, "parentTaskId");
        let tasks: Vec<Value> = (0..page.limit.max(0))
            .map(|i| {
                json!({
                    "taskId": synthetic_id("tm_task"),
                    "title": format!("task {i}"),
                    "parentTaskId": parent,
                })
            })
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(tasks.len()) });
        data["tasks"] = json!(tasks);
        Result::ok_with_data("ok", data)
    }

    fn list_subtasks(&self, payload: &Value) -> Result {
        let Some(task_id) = required_str(payload, "taskId") else {
            return missing_id("taskId");
        };
        let page = Pagination::from_payload(payload, DEFAULT_TASK_LIMIT);
        let subtasks: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "taskId": synthetic_id("tm_task"), "parentTaskId": task_id, "title": format!("subtask {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(subtasks.len()) });
        data["tasks"] = json!(subtasks);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for TaskMasterAdapter {
    fn tool(&self) -> &str {
        "taskmaster"
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
            "complete_task" => self.complete_task(&payload),
            "delete_task" => self.delete_task(&payload),
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
            "list_subtasks" => self.list_subtasks(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "taskmaster".to_string(),
            name: "TaskMaster".to_string(),
            description: "Create and manage tasks and subtasks in TaskMaster.".to_string(),
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

    fn adapter() -> TaskMasterAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        TaskMasterAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn create_task_without_title_is_missing_fields() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "create_task" })).await;
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
    async fn create_task_succeeds_with_title() {
        let a = adapter();
        let result = a
            .send("agent", "user", json!({ "action": "create_task", "title": "ship it" }))
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn list_subtasks_requires_task_id() {
        let a = adapter();
        let result = a.fetch("agent", "user", Some(json!({ "action": "list_subtasks" }))).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingId);
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "nuke" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::UnknownAction);
    }
}
