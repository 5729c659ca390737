//! Notion adapter: page creation and database querying over the simulated
//! Notion REST surface (§4.6).

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
    unknown_action, Pagination, DEFAULT_WORKSPACE_LIMIT,
};

pub struct NotionAdapter {
    base: ProviderBase,
}

impl NotionAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "notion",
                integration_manager,
                http,
                vec!["default".to_string()],
            ),
        }
    }

    fn create_page(&self, payload: &Value) -> Result {
        let Some(database_id) = required_str(payload, "databaseId") else {
            return missing_fields(&["databaseId"]);
        };
        let Some(title) = required_str(payload, "title") else {
            return missing_fields(&["title"]);
        };
        let page_id = synthetic_id("page");
        Result::ok_with_data(
            "page created",
            json!({
                "pageId": page_id,
                "databaseId": database_id,
                "title": title,
                "content": optional_str(payload, "content"),
            }),
        )
    }

    fn update_page(&self, payload: &Value) -> Result {
        let Some(page_id) = required_str(payload, "pageId") else {
            return missing_id("pageId");
        };
        Result::ok_with_data(
            "page updated",
            json!({ "pageId": page_id, "updated": true }),
        )
    }

    fn query_database(&self, payload: &Value) -> Result {
        let Some(database_id) = required_str(payload, "databaseId") else {
            return missing_fields(&["databaseId"]);
        };
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let pages: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "pageId": synthetic_id("page"), "databaseId": database_id, "title": format!("row {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(pages.len()) });
        data["pages"] = json!(pages);
        Result::ok_with_data("ok", data)
    }

    fn list_databases(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let databases: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "databaseId": synthetic_id("db"), "title": format!("database {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(databases.len()) });
        data["databases"] = json!(databases);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for NotionAdapter {
    fn tool(&self) -> &str {
        "notion"
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
            "create_page" => self.create_page(&payload),
            "update_page" => self.update_page(&payload),
            other => unknown_action(other),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        let payload = query.unwrap_or(json!({}));
        let Some(action) = required_action(&payload) else {
            return api_error("fetch requires an action", None);
        };
        match action {
            "query_database" => self.query_database(&payload),
            "list_databases" => self.list_databases(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "notion".to_string(),
            name: "Notion".to_string(),
            description: "Create pages and query databases in Notion.".to_string(),
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

    fn adapter() -> NotionAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        NotionAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn create_page_without_database_id_is_missing_fields() {
        let a = adapter();
        let result = a
            .send("agent", "user", json!({ "action": "create_page", "title": "notes" }))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn update_page_without_page_id_is_missing_id() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "update_page" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingId);
    }

    #[tokio::test]
    async fn query_database_requires_database_id() {
        let a = adapter();
        let result = a.fetch("agent", "user", Some(json!({ "action": "query_database" }))).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn create_page_succeeds_with_required_fields() {
        let a = adapter();
        let result = a
            .send(
                "agent",
                "user",
                json!({ "action": "create_page", "databaseId": "db1", "title": "notes" }),
            )
            .await;
        assert!(result.success);
    }
}
