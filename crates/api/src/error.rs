//! The HTTP boundary's error type (§7): wraps [`pe_core::EngineError`] (and
//! the Store/Cache errors it already carries) with an HTTP status, mirroring
//! the teacher's `agent::api::ApiError` shape minus the OpenAPI annotations
//! this workspace has no use for.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use pe_core::error::EngineError;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match &err {
            EngineError::NotConnected => StatusCode::CONFLICT,
            EngineError::ToolDisabled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::AdapterNotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::UnsupportedAction { .. } | EngineError::UnknownAction { .. } => {
                StatusCode::BAD_REQUEST
            }
            EngineError::MissingFields { .. } | EngineError::MissingId { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::ApiError { .. } | EngineError::NetworkError(_) => StatusCode::BAD_GATEWAY,
            EngineError::TokenRefreshFailed(_) => StatusCode::UNAUTHORIZED,
            EngineError::ExecutionError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::DatabaseError(_) | EngineError::CacheError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %err, "API responding with internal error");
        }
        Self::new(status, err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, axum::Json(ErrorBody { error: self.message })).into_response()
    }
}
