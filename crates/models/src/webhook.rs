use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Error,
}

/// A provider push-event subscription the engine has registered on behalf
/// of a user or team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: Id,
    pub provider: String,
    pub owner_id: String,
    pub resource_id: Option<String>,
    pub subscription_id: String,
    pub endpoint: String,
    pub events: BTreeSet<String>,
    pub status: SubscriptionStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum WebhookEventStatus {
    Pending,
    Processed,
    Failed,
}

/// A single ingested provider push event, persisted before any heavy
/// processing and acknowledged to the provider immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Id,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: Value,
    pub status: WebhookEventStatus,
    pub created_at: DateTime<Utc>,
}
