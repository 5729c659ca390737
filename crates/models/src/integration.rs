use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum IntegrationStatus {
    Active,
    Revoked,
    Error,
}

/// A stored OAuth credential set for a `(userId, toolName)` pair.
///
/// `(user_id, tool_name)` is the natural key. Rows are never physically
/// deleted: disconnect sets `status = revoked` for audit retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: Id,
    pub user_id: String,
    pub tool_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub status: IntegrationStatus,
    pub scopes: BTreeSet<String>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    /// An integration is usable without a refresh when it is active and
    /// either carries no expiry or has not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == IntegrationStatus::Active
            && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

/// Fields accepted by `storeIntegration` for a conditional upsert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewIntegration {
    pub user_id: String,
    pub tool_name: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

/// Redacted view of an [`Integration`] suitable for listing over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationSummary {
    pub id: Id,
    pub user_id: String,
    pub tool_name: String,
    pub status: IntegrationStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Integration> for IntegrationSummary {
    fn from(i: Integration) -> Self {
        Self {
            id: i.id,
            user_id: i.user_id,
            tool_name: i.tool_name,
            status: i.status,
            expires_at: i.expires_at,
            scopes: i.scopes,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

/// Result of `isConnected`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
