//! Validation and pagination helpers shared across adapters' internal
//! action dispatch (§4.6).

use serde_json::{json, Value};

use pe_models::{ErrorCode, ErrorDetail, EngineResult as Result, PaginationMeta};

pub const DEFAULT_TASK_LIMIT: i64 = 20;
pub const DEFAULT_PROJECT_LIMIT: i64 = 20;
pub const DEFAULT_WORKSPACE_LIMIT: i64 = 50;

pub fn unknown_action(action: &str) -> Result {
    Result::fail(
        format!("unknown action: {action}"),
        ErrorDetail {
            code: ErrorCode::UnknownAction,
            message: format!("unknown action: {action}"),
            details: None,
        },
    )
}

pub fn missing_fields(fields: &[&str]) -> Result {
    let joined = fields.join(", ");
    Result::fail(
        format!("missing required fields: {joined}"),
        ErrorDetail {
            code: ErrorCode::MissingFields,
            message: format!("missing required fields: {joined}"),
            details: None,
        },
    )
}

pub fn missing_id(field: &str) -> Result {
    Result::fail(
        format!("missing id: {field}"),
        ErrorDetail {
            code: ErrorCode::MissingId,
            message: format!("missing id: {field}"),
            details: None,
        },
    )
}

pub fn api_error(message: impl Into<String>, details: Option<Value>) -> Result {
    let message = message.into();
    Result::fail(
        message.clone(),
        ErrorDetail {
            code: ErrorCode::ApiError,
            message,
            details,
        },
    )
}

/// Reads a required non-empty string field out of a JSON object payload.
pub fn required_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

pub fn optional_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload.get(field).and_then(Value::as_str)
}

pub fn required_action(payload: &Value) -> Option<&str> {
    required_str(payload, "action")
}

/// `limit`/`offset` pagination params, defaulting per §4.6.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    pub fn from_payload(payload: &Value, default_limit: i64) -> Self {
        let limit = payload
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(default_limit);
        let offset = payload.get("offset").and_then(Value::as_i64).unwrap_or(0);
        Self { limit, offset }
    }

    /// `metadata.pagination` when the total item count is unknown (e.g. a
    /// simulated search): a full page is treated as possibly having more,
    /// a short page as exhausted. Every adapter in this workspace
    /// simulates list responses rather than querying a real provider for a
    /// total count (§9), so this is the only pagination mode in use.
    pub fn metadata_unknown_total(&self, returned: usize) -> Value {
        let has_more = returned as i64 >= self.limit && self.limit > 0;
        let meta = PaginationMeta {
            has_more,
            next_offset: has_more.then_some(self.offset + returned as i64),
            next_uri: None,
        };
        json!({ "pagination": meta })
    }
}

/// A synthetic external id, stable for test assertions and plausible for a
/// provider resource id, constructed from `prefix` and a fresh UUID (§9:
/// adapters simulate success but preserve the id/Result contract).
pub fn synthetic_id(prefix: &str) -> String {
    format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
}
