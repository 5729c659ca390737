//! Trello adapter: card and board operations over the simulated Trello REST
//! surface (§4.6).

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

pub struct TrelloAdapter {
    base: ProviderBase,
}

impl TrelloAdapter {
    pub fn new(integration_manager: Arc<IntegrationManager>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            base: ProviderBase::new(
                "trello",
                integration_manager,
                http,
                vec!["default".to_string()],
            ),
        }
    }

    fn create_card(&self, payload: &Value) -> Result {
        let Some(list_id) = required_str(payload, "listId") else {
            return missing_fields(&["listId"]);
        };
        let Some(name) = required_str(payload, "name") else {
            return missing_fields(&["name"]);
        };
        let card_id = synthetic_id("card");
        Result::ok_with_data(
            "card created",
            json!({
                "cardId": card_id,
                "listId": list_id,
                "name": name,
                "description": optional_str(payload, "description"),
            }),
        )
    }

    fn update_card(&self, payload: &Value) -> Result {
        let Some(card_id) = required_str(payload, "cardId") else {
            return missing_id("cardId");
        };
        Result::ok_with_data(
            "card updated",
            json!({ "cardId": card_id, "updated": true }),
        )
    }

    fn list_boards(&self, payload: &Value) -> Result {
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let boards: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "boardId": synthetic_id("board"), "name": format!("board {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(boards.len()) });
        data["boards"] = json!(boards);
        Result::ok_with_data("ok", data)
    }

    fn list_cards(&self, payload: &Value) -> Result {
        let Some(list_id) = required_str(payload, "listId") else {
            return missing_fields(&["listId"]);
        };
        let page = Pagination::from_payload(payload, DEFAULT_WORKSPACE_LIMIT);
        let cards: Vec<Value> = (0..page.limit.max(0))
            .map(|i| json!({ "cardId": synthetic_id("card"), "listId": list_id, "name": format!("card {i}") }))
            .collect();
        let mut data = json!({ "metadata": page.metadata_unknown_total(cards.len()) });
        data["cards"] = json!(cards);
        Result::ok_with_data("ok", data)
    }
}

#[async_trait]
impl Adapter for TrelloAdapter {
    fn tool(&self) -> &str {
        "trello"
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
            "create_card" => self.create_card(&payload),
            "update_card" => self.update_card(&payload),
            other => unknown_action(other),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        let payload = query.unwrap_or(json!({}));
        let Some(action) = required_action(&payload) else {
            return api_error("fetch requires an action", None);
        };
        match action {
            "list_boards" => self.list_boards(&payload),
            "list_cards" => self.list_cards(&payload),
            other => unknown_action(other),
        }
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "trello".to_string(),
            name: "Trello".to_string(),
            description: "Create and manage cards on Trello boards.".to_string(),
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

    fn adapter() -> TrelloAdapter {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let manager = Arc::new(IntegrationManager::new(store, cache));
        TrelloAdapter::new(manager, Arc::new(crate::http_client::ReqwestHttpClient::new()))
    }

    #[tokio::test]
    async fn create_card_without_list_id_is_missing_fields() {
        let a = adapter();
        let result = a
            .send("agent", "user", json!({ "action": "create_card", "name": "ship it" }))
            .await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn update_card_without_card_id_is_missing_id() {
        let a = adapter();
        let result = a.send("agent", "user", json!({ "action": "update_card" })).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingId);
    }

    #[tokio::test]
    async fn list_cards_requires_list_id() {
        let a = adapter();
        let result = a.fetch("agent", "user", Some(json!({ "action": "list_cards" }))).await;
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, pe_models::ErrorCode::MissingFields);
    }

    #[tokio::test]
    async fn create_card_succeeds_with_required_fields() {
        let a = adapter();
        let result = a
            .send(
                "agent",
                "user",
                json!({ "action": "create_card", "listId": "l1", "name": "ship it" }),
            )
            .await;
        assert!(result.success);
    }
}
