//! Slack adapter: message posting and channel history over the simulated
//! Slack Web API surface (§4.6).

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
    api_error, missing_fields, optional_str, required_action, required_str, synthetic_id,
    unknown_action, Pagination, DEFAULT_WORKSPACE_LIMIT,
};

pub struct SlackAdapter {
    base: ProviderBase,
}

impl SlackAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "slack",
                integration_manager,
                http,
                vec!["chat:write".to_string(), "channels:read".to_string()],
            ),
        }
    }

    fn send_message(&self, payload: &Value) -> Result {
        let Some(channel) = required_str(payload, "channel") else {
            return missing_fields(&["channel"]);
        };
        let Some(text) = required_str(payload, "text") else {
            return missing_fields(&["text"]);
        };
        let ts = synthetic_id("ts");
        Result::ok_with_data(
            "message posted",
            json!({
                "channel": channel,
                "ts": ts,
                "text": text,
                "threadTs": optional_str(payload, "threadTs"),
            }),
        )
    }

    fn list_channels(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let channels: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "channelId": synthetic_id("chan"), "name": format!("channel-{i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(channels.len()) });
        data["channels"] = json!(channels);
        Result::ok_with_data("ok", data)
    }

    fn get_channel_history(&self, payload: &Value) -> Result {
        let Some(channel) = required_str(payload, "channel") else {
            return missing_fields(&["channel"]);
        };
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let messages: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "ts": synthetic_id("ts"), "channel": channel, "text": format!("message {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(messages.len()) });
        data["messages"] = json!(messages);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for SlackAdapter {
    fn tool(&self) -> &str {
        "slack"
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
            "send_message" | "post_message" => self.send_message(&payload),
            other => unknown_action(other),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        let payload = query.unwrap_or(json!({}));
        let Some(action) = required_action(&payload) else {
            return api_error("fetch requires an action", None);
        };
        match action {
            "list_channels" => self.list_channels(&payload),
            "get_channel_history" => self.get_channel_history(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "slack".to_string(),
            name: "Slack".to_string(),
            description: "Post messages and read channel history in Slack.".to_string(),
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

    fn adapter() -> SlackAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        SlackAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn send_message_requires_channel_and_text() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "send_message" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn send_message_succeeds_with_required_fields() {
        let a = adapter();
        let result = a
            .send(
                "agent",
                "user",
                json!({ "action": "send_message", "channel": "C123", "text": "hello" }),
            )
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn get_channel_history_requires_channel() {
        let a = adapter();
        let result = a
            .fetch("agent", "user", Some(json!({ "action": "get_channel_history" })))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn list_channels_succeeds() {
        let a = adapter();
        let result = a.fetch("agent", "user", Some(json!({ "action": "list_channels" }))).await;
        assert!(result.success);
    }
}
