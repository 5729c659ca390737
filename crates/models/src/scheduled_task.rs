use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::ErrorDetail;
use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal states are write-once: once reached, no further transition
    /// is permitted for that row.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A task an agent asked to run at a future time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: Id,
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub action: String,
    pub payload: Map<String, Value>,
    pub execute_at: DateTime<Utc>,
    pub status: TaskStatus,
    pub attempts: i32,
    pub result: Option<Value>,
    pub error: Option<ErrorDetail>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by `scheduleTask`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledTask {
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub action: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    pub execute_at: DateTime<Utc>,
}
