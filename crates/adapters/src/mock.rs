//! The reference/test adapter (§8 scenarios S1, S4, S5). Registered under
//! the tool id `mock` in non-production wiring so integration tests and
//! local development have a connected, scriptable adapter without any
//! provider credentials.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use pe_models::{AdapterMetadata, AuthStatus, ErrorDetail, EngineResult as Result};

use pe_core::adapter::Adapter;
use pe_core::error::CoreResult;

/// What the next `send`/`fetch` call should do. Set by tests to script a
/// specific outcome, then consumed (single-shot) so later calls revert to
/// [`Behavior::Succeed`].
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(ErrorDetail, String),
}

struct State {
    connected: bool,
    next: Option<Behavior>,
}

pub struct MockAdapter {
    state: Mutex<State>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                connected: true,
                next: None,
            }),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().unwrap().connected = connected;
    }

    /// Scripts the outcome of the very next `send`/`fetch` call.
    pub fn set_next_behavior(&self, behavior: Behavior) {
        self.state.lock().unwrap().next = Some(behavior);
    }

    fn take_behavior(&self) -> Behavior {
        self.state
            .lock()
            .unwrap()
            .next
            .take()
            .unwrap_or(Behavior::Succeed)
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MockAdapter {
    fn tool(&self) -> &str {
        "mock"
    }

    async fn connect(&self, _user_id: &str) -> CoreResult<AuthStatus> {
        self.state.lock().unwrap().connected = true;
        Ok(AuthStatus {
            connected: true,
            expires_at: None,
            scopes: Some(vec!["mock:all".to_string()]),
            error: None,
        })
    }

    async fn is_connected(&self, _user_id: &str) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn send(&self, _agent_id: &str, _user_id: &str, payload: Value) -> Result {
        match self.take_behavior() {
            Behavior::Succeed => Result::ok_with_data("ok", json!({ "echo": payload })),
            Behavior::Fail(error, message) => Result::fail(message, error),
        }
    }

    async fn fetch(&self, _agent_id: &str, _user_id: &str, query: Option<Value>) -> Result {
        match self.take_behavior() {
            Behavior::Succeed => Result::ok_with_data("ok", json!({ "echo": query })),
            Behavior::Fail(error, message) => Result::fail(message, error),
        }
    }

    async fn disconnect(&self, _user_id: &str) -> CoreResult<()> {
        self.state.lock().unwrap().connected = false;
        Ok(())
    }

    fn get_metadata(&self) -> AdapterMetadata {
        AdapterMetadata {
            id: "mock".to_string(),
            name: "Mock".to_string(),
            description: "Reference adapter for tests and local development.".to_string(),
            version: "1.0.0".to_string(),
            author: "plugin-engine".to_string(),
            scopes: vec!["mock:all".to_string()],
            config_schema: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pe_models::ErrorCode;

    #[tokio::test]
    async fn succeeds_by_default() {
        let adapter = MockAdapter::new();
        let result = adapter.send("a", "u", json!({"k": "v"})).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn scripted_failure_is_single_shot() {
        let adapter = MockAdapter::new();
        adapter.set_next_behavior(Behavior::Fail(
            ErrorDetail {
                code: ErrorCode::ExecutionError,
                message: "boom".to_string(),
                details: None,
            },
            "boom".to_string(),
        ));
        let first = adapter.send("a", "u", json!({})).await;
        assert!(!first.success);
        assert_eq!(first.error.unwrap().code, ErrorCode::ExecutionError);

        let second = adapter.send("a", "u", json!({})).await;
        assert!(second.success);
    }

    #[tokio::test]
    async fn disconnect_flips_is_connected() {
        let adapter = MockAdapter::new();
        assert!(adapter.is_connected("u").await);
        adapter.disconnect("u").await.unwrap();
        assert!(!adapter.is_connected("u").await);
    }
}
