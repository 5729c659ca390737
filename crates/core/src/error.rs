use pe_models::ErrorCode;
use thiserror::Error;

/// The engine-wide error taxonomy (§7), carried exactly as named in the
/// spec rather than invented per-crate. Every variant maps to a single
/// [`ErrorCode`] via [`EngineError::code`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no active integration for this tool")]
    NotConnected,

    #[error("tool {tool} is currently disabled due to excessive errors")]
    ToolDisabled { tool: String },

    #[error("no adapter found for tool: {tool}")]
    AdapterNotFound { tool: String },

    #[error("unsupported action: {intent}")]
    UnsupportedAction { intent: String },

    #[error("unknown action: {action}")]
    UnknownAction { action: String },

    #[error("missing required fields: {fields}")]
    MissingFields { fields: String },

    #[error("missing id: {field}")]
    MissingId { field: String },

    #[error("upstream provider error: {message}")]
    ApiError {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("{0}")]
    ExecutionError(String),

    #[error("store error")]
    DatabaseError(#[from] pe_store::StoreError),

    #[error("cache error")]
    CacheError(#[from] pe_cache::CacheError),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::NotConnected => ErrorCode::NotConnected,
            EngineError::ToolDisabled { .. } => ErrorCode::ToolDisabled,
            EngineError::AdapterNotFound { .. } => ErrorCode::AdapterNotFound,
            EngineError::UnsupportedAction { .. } => ErrorCode::UnsupportedAction,
            EngineError::UnknownAction { .. } => ErrorCode::UnknownAction,
            EngineError::MissingFields { .. } => ErrorCode::MissingFields,
            EngineError::MissingId { .. } => ErrorCode::MissingId,
            EngineError::ApiError { .. } => ErrorCode::ApiError,
            EngineError::NetworkError(_) => ErrorCode::NetworkError,
            EngineError::TokenRefreshFailed(_) => ErrorCode::TokenRefreshFailed,
            EngineError::ExecutionError(_) => ErrorCode::ExecutionError,
            EngineError::DatabaseError(_) => ErrorCode::DatabaseError,
            EngineError::CacheError(_) => ErrorCode::DatabaseError,
        }
    }
}

pub type CoreResult<T> = Result<T, EngineError>;
