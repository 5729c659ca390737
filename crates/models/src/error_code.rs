use serde::{Deserialize, Serialize};

/// The error-code taxonomy shared by adapters, the dispatcher, and the HTTP
/// boundary. Every structured failure the engine produces carries one of
/// these, never a bare string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "text", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotConnected,
    ToolDisabled,
    AdapterNotFound,
    UnsupportedAction,
    UnknownAction,
    MissingFields,
    MissingId,
    ApiError,
    NetworkError,
    TokenRefreshFailed,
    ExecutionError,
    DatabaseError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotConnected => "NOT_CONNECTED",
            ErrorCode::ToolDisabled => "TOOL_DISABLED",
            ErrorCode::AdapterNotFound => "ADAPTER_NOT_FOUND",
            ErrorCode::UnsupportedAction => "UNSUPPORTED_ACTION",
            ErrorCode::UnknownAction => "UNKNOWN_ACTION",
            ErrorCode::MissingFields => "MISSING_FIELDS",
            ErrorCode::MissingId => "MISSING_ID",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            ErrorCode::ExecutionError => "EXECUTION_ERROR",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
