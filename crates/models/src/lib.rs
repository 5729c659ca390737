//! Shared data model for the plugin engine: the wire envelopes
//! (`TaskIntent`, `EngineResult`) and the persisted record types owned by
//! the Durable Store.

mod context_mapping;
mod envelope;
mod error_code;
mod error_log;
mod fallback;
mod id;
mod integration;
mod scheduled_task;
mod webhook;

pub use context_mapping::{ContextMapping, ContextMappingPatch, NewContextMapping};
pub use envelope::{AdapterMetadata, AuthStatus, EngineResult, ErrorDetail, PaginationMeta, TaskIntent};
pub use error_code::ErrorCode;
pub use error_log::{
    ErrorCodeStat, ErrorLog, ErrorTrendPoint, NewErrorLog, ToolErrorStat,
};
pub use fallback::{FallbackMessage, DEFAULT_FALLBACK_MESSAGE};
pub use id::Id;
pub use integration::{
    ConnectionStatus, Integration, IntegrationStatus, IntegrationSummary, NewIntegration,
};
pub use scheduled_task::{NewScheduledTask, ScheduledTask, TaskStatus};
pub use webhook::{SubscriptionStatus, WebhookEvent, WebhookEventStatus, WebhookSubscription};
