//! Gmail adapter: send/list/search/get over the simulated Gmail REST
//! surface (§4.6, §9 "several adapters simulate success").

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
    api_error, missing_fields, missing_id, required_action, required_str, synthetic_id,
    unknown_action, Pagination, DEFAULT_TASK_LIMIT,
};

pub struct GmailAdapter {
    base: ProviderBase,
}

impl GmailAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "gmail",
                integration_manager,
                http,
                vec![
                    "https://www.googleapis.com/auth/gmail.send".to_string(),
                    "https://www.googleapis.com/auth/gmail.readonly".to_string(),
                ],
            ),
        }
    }

    fn send_email(&self, payload: &Value) -> Result {
        let mut missing = Vec::new();
        for field in ["to", "subject", "body"] {
            if required_str(payload, field).is_none() {
                missing.push(field);
            }
        }
        if !missing.is_empty() {
            return missing_fields(&missing);
        }
        let message_id = synthetic_id("msg");
        Result::ok_with_data(
            "email sent",
            json!({ "messageId": message_id, "to": payload["to"], "subject": payload["subject"] }),
        )
    }

    fn list_messages(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_TASK_LIMIT);
        let messages: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "id": synthetic_id("msg"), "snippet": format!("message {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(messages.len()) });
        data["messages"] = json!(messages);
        Result::ok_with_data("ok", data)
    }

    fn get_message(&self, payload: &Value) -> Result {
        let Some(message_id) = required_str(payload, "messageId") else {
            return missing_id("messageId");
        };
        Result::ok_with_data(
            "ok",
            json!({ "id": message_id, "snippet": "simulated message body" }),
        )
    }

    fn search_messages(&self, payload: &Value) -> Result {
        let query = required_str(payload, "query").unwrap_or("");
        let page = Pagination::from_payload(payload, DEFAULT_TASK_LIMIT);
        let messages: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "id": synthetic_id("msg"), "matched": query, "rank": i }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(messages.len()) });
        data["messages"] = json!(messages);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for GmailAdapter {
    fn tool(&self) -> &str {
        "gmail"
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
            "send_email" | "send" => self.send_email(&payload),
            other => unknown_action(other),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        let payload = query.unwrap_or(json!({}));
        let Some(action) = required_action(&payload) else {
            return api_error("fetch requires an action", None);
        };
        match action {
            "list_messages" => self.list_messages(&payload),
            "get_message" => self.get_message(&payload),
            "search_messages" => self.search_messages(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "gmail".to_string(),
            name: "Gmail".to_string(),
            description: "Send and search email via Gmail.".to_string(),
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

    fn adapter() -> GmailAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        GmailAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn send_email_requires_fields() {
        let a = adapter();
        let result = a
            .send("agent", "user", json!({ "action": "send_email", "to": "x@example.com" }))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn send_email_succeeds_with_all_fields() {
        let a = adapter();
        let result = a
            .send(
                "agent",
                "user",
                json!({ "action": "send_email", "to": "x@example.com", "subject": "hi", "body": "hello" }),
            )
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn get_message_requires_id() {
        let a = adapter();
        let result = a.fetch("agent", "user", Some(json!({ "action": "get_message" }))).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingId);
    }

    #[tokio::test]
    async fn connect_then_is_connected() {
        let a = adapter();
        assert!(!a.is_connected("user").await);
        a.connect("user").await.unwrap();
        assert!(a.is_connected("user").await);
    }
}
