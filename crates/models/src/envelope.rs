use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error_code::ErrorCode;

/// A declarative task intent from an autonomous agent, as received over
/// `POST /plugin-engine/intents` (or synthesized by the sweeper for a due
/// scheduled task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIntent {
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub intent: String,
    #[serde(default)]
    pub context: serde_json::Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Structured error detail attached to a failed [`EngineResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The uniform result envelope returned by adapters and the dispatcher
/// alike. `success` is always present; `message` is always a human-readable
/// string (the fallback, on failure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl EngineResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            external_id: None,
            metadata: None,
            error: None,
        }
    }

    pub fn ok_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::ok(message)
        }
    }

    pub fn fail(message: impl Into<String>, error: ErrorDetail) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            external_id: None,
            metadata: None,
            error: Some(error),
        }
    }
}

/// Pagination metadata set on list-style adapter responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_uri: Option<String>,
}

/// `connect` / `isConnected` outcome from an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Adapter self-description, returned by `getMetadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: String,
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_schema: Option<Value>,
}
