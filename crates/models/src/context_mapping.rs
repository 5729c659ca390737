use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::Id;

/// A translation between an agent-local identifier and an external
/// provider identifier, scoped to `(agent_id, tool)`.
///
/// Natural key: `(agent_id, tool, context_key)`. Also unique on
/// `(agent_id, tool, external_id)` for reverse lookup integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMapping {
    pub id: Id,
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub context_key: String,
    pub external_id: String,
    pub metadata: Option<Value>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted by `createMapping` / `upsertMapping`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewContextMapping {
    pub agent_id: String,
    pub user_id: String,
    pub tool: String,
    pub context_key: String,
    pub external_id: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update accepted by `updateMapping`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextMappingPatch {
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
