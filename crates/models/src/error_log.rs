use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error_code::ErrorCode;
use crate::id::Id;

/// A logged failure from a dispatched intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLog {
    pub id: Id,
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub action: String,
    pub error_code: ErrorCode,
    pub error_message: String,
    pub payload: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Fields accepted by `logError`.
#[derive(Debug, Clone)]
pub struct NewErrorLog {
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub action: String,
    pub error_code: ErrorCode,
    pub error_message: String,
    pub payload: Option<Map<String, Value>>,
    pub timestamp: DateTime<Utc>,
}

/// One day's bucket from `getErrorTrends`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorTrendPoint {
    pub date: chrono::NaiveDate,
    pub count: i64,
}

/// One tool's bucket from `getErrorStatsByTool`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolErrorStat {
    pub tool: String,
    pub count: i64,
}

/// One code's bucket from `getMostFrequentErrorCodes`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeStat {
    pub error_code: ErrorCode,
    pub count: i64,
}
