use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pe_models::{
    ContextMapping, ContextMappingPatch, ErrorCodeStat, ErrorLog, FallbackMessage, Id,
    Integration, IntegrationStatus, NewContextMapping, NewErrorLog, NewIntegration,
    NewScheduledTask, ScheduledTask, ToolErrorStat, WebhookEvent, WebhookEventStatus,
    WebhookSubscription,
};

use crate::StoreResult;

/// A batch of scheduled tasks claimed by [`Store::claim_due_tasks`], each
/// already transitioned to `processing` with `attempts` incremented.
pub type ClaimedTask = ScheduledTask;

/// The authoritative record owner. Every mutation the engine performs
/// lands here first; the KV cache is always secondary (§3 ownership rule).
///
/// Implementations must be cheap to clone (an `Arc`-wrapped pool or an
/// `Arc<Mutex<..>>` in-memory map) since `pe-core` holds one behind an
/// `Arc<dyn Store>` shared across every request.
#[async_trait]
pub trait Store: Send + Sync {
    // -- Integrations --------------------------------------------------

    /// Conditional upsert on the natural key `(user_id, tool_name)`.
    async fn upsert_integration(&self, new: NewIntegration) -> StoreResult<Integration>;

    async fn get_integration(&self, user_id: &str, tool: &str) -> StoreResult<Option<Integration>>;

    /// Persists a refreshed access/refresh token pair and clears `error`
    /// status back to `active`.
    async fn update_integration_tokens(
        &self,
        id: Id,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Integration>;

    async fn set_integration_status(
        &self,
        id: Id,
        status: IntegrationStatus,
    ) -> StoreResult<Integration>;

    async fn list_integrations(&self, user_id: &str) -> StoreResult<Vec<Integration>>;

    // -- Scheduled tasks --------------------------------------------------

    async fn insert_scheduled_task(&self, new: NewScheduledTask) -> StoreResult<ScheduledTask>;

    async fn get_scheduled_task(&self, id: Id) -> StoreResult<Option<ScheduledTask>>;

    async fn list_scheduled_tasks(&self, user_id: &str) -> StoreResult<Vec<ScheduledTask>>;

    /// Atomically claims up to `limit` rows with `status = scheduled AND
    /// execute_at <= now`, transitioning each to `processing` with
    /// `attempts := attempts + 1` in the same statement. Two concurrent
    /// callers against the same backing store must see disjoint results
    /// (§5 "Locking/transactions", §9 "Scheduler claim atomicity").
    async fn claim_due_tasks(
        &self,
        limit: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ClaimedTask>>;

    async fn complete_task(
        &self,
        id: Id,
        result: Option<serde_json::Value>,
    ) -> StoreResult<ScheduledTask>;

    async fn fail_task(
        &self,
        id: Id,
        error: pe_models::ErrorDetail,
    ) -> StoreResult<ScheduledTask>;

    /// Only valid from `scheduled`; idempotent (already-`cancelled` is a
    /// no-op success, any other non-`scheduled` state is a `Conflict`).
    async fn cancel_task(&self, id: Id) -> StoreResult<ScheduledTask>;

    /// Resets a terminal `failed` row back to `scheduled` at
    /// `execute_at`, provided `attempts < max_attempts`.
    async fn reschedule_task(
        &self,
        id: Id,
        execute_at: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<Option<ScheduledTask>>;

    /// Bulk delete of terminal rows with `updated_at < cutoff`. Returns
    /// the number of rows removed.
    async fn cleanup_completed_tasks(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;

    // -- Error logs --------------------------------------------------

    async fn insert_error_log(&self, new: NewErrorLog) -> StoreResult<Id>;

    async fn resolve_error(&self, id: Id) -> StoreResult<bool>;

    async fn list_agent_errors(&self, agent_id: &str, limit: i64) -> StoreResult<Vec<ErrorLog>>;

    async fn error_stats_by_tool(&self, since: DateTime<Utc>) -> StoreResult<Vec<ToolErrorStat>>;

    /// Raw per-day counts in `[start, end]`, no zero-filling — the caller
    /// (`pe-core::ErrorHandler::get_error_trends`) fills in absent days.
    async fn error_trends(
        &self,
        tool: Option<&str>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<Vec<(NaiveDate, i64)>>;

    async fn most_frequent_error_codes(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ErrorCodeStat>>;

    // -- Fallback messages --------------------------------------------------

    /// Persists the scope `(tool, agent_id)` -> `message`; used by
    /// `setFallbackMessage`, resolving the §9 open question that the
    /// source only mirrored to memory.
    async fn upsert_fallback_message(&self, entry: FallbackMessage) -> StoreResult<()>;

    /// All stored entries, used to rebuild `ErrorHandler`'s in-memory map
    /// on boot.
    async fn list_fallback_messages(&self) -> StoreResult<Vec<FallbackMessage>>;

    // -- Context mappings --------------------------------------------------

    async fn upsert_context_mapping(
        &self,
        new: NewContextMapping,
    ) -> StoreResult<ContextMapping>;

    async fn get_context_mapping_by_id(&self, id: Id) -> StoreResult<Option<ContextMapping>>;

    async fn get_context_mapping(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<Option<ContextMapping>>;

    async fn get_context_mapping_by_external_id(
        &self,
        agent_id: &str,
        tool: &str,
        external_id: &str,
    ) -> StoreResult<Option<ContextMapping>>;

    async fn update_context_mapping(
        &self,
        id: Id,
        patch: ContextMappingPatch,
    ) -> StoreResult<Option<ContextMapping>>;

    async fn delete_context_mapping_by_id(&self, id: Id) -> StoreResult<bool>;

    async fn delete_context_mapping_by_key(
        &self,
        agent_id: &str,
        tool: &str,
        context_key: &str,
    ) -> StoreResult<bool>;

    async fn list_context_mappings(
        &self,
        agent_id: &str,
        tool: &str,
    ) -> StoreResult<Vec<ContextMapping>>;

    // -- Webhook subscriptions --------------------------------------------------

    async fn upsert_webhook_subscription(
        &self,
        subscription: WebhookSubscription,
    ) -> StoreResult<WebhookSubscription>;

    /// `expires_at <= now + 24h OR status = error` (§4.7 renewal sweep).
    async fn list_subscriptions_due_for_renewal(
        &self,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<WebhookSubscription>>;

    async fn get_webhook_subscription(&self, id: Id) -> StoreResult<Option<WebhookSubscription>>;

    // -- Webhook events --------------------------------------------------

    async fn insert_webhook_event(
        &self,
        provider: &str,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> StoreResult<WebhookEvent>;

    async fn update_webhook_event_status(
        &self,
        id: Id,
        status: WebhookEventStatus,
    ) -> StoreResult<Option<WebhookEvent>>;
}
