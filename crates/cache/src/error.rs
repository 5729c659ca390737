use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error")]
    Backend(#[from] anyhow::Error),

    #[error("cache value serialization error")]
    Serde(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;
