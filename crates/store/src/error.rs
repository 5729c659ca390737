use thiserror::Error;

/// Failure modes surfaced by the Durable Store, independent of backend.
///
/// Mirrors the shape of the teacher's `AppError::Sqlx` match arms
/// (`RowNotFound` vs. `Database` vs. everything else) without tying callers
/// in `pe-core` to a concrete driver.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("store backend error")]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
