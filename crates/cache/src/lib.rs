//! The Key-Value cache (KV): hot lookups and TTL'd counters, always
//! secondary to the Durable Store (§3). [`Cache`] is the seam
//! `pe-core` depends on so a Redis outage degrades to cache-miss
//! behavior rather than taking down the dispatcher.

mod error;
pub mod memory;
pub mod redis_cache;

pub use error::{CacheError, CacheResult};

use async_trait::async_trait;
use std::time::Duration;

/// A hot, TTL-bearing store of opaque string values plus the `INCR`
/// primitive the circuit breaker and retry counters are built on.
///
/// Every method is advisory: a cache miss or backend error must never be
/// treated as ground truth by a caller that can instead consult the
/// Durable Store (§3 ownership rule — "KV never holds a value that
/// contradicts a successfully committed DS write more than the cache's
/// TTL window").
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Atomically increments `key` (creating it at 1 if absent) and
    /// returns the new value. Implementations must apply `ttl_on_create`
    /// only on the increment that creates the key, matching the
    /// `INCR` + conditional `EXPIRE` pattern used for `error_count:*`
    /// keys (§4.3 "sets TTL 3600s on first increment").
    async fn incr(&self, key: &str, ttl_on_create: Duration) -> CacheResult<i64>;

    /// Current value of a counter without mutating it; `0` if absent.
    async fn get_counter(&self, key: &str) -> CacheResult<i64>;
}

/// `serde_json` convenience helpers layered over the raw string `Cache`,
/// mirroring how the dispatcher and the context mapper actually use it
/// (every KV value the engine stores is a JSON-serialized record or a
/// bare external id string).
#[async_trait]
pub trait CacheExt: Cache {
    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw).map_err(CacheError::from)?)),
            None => Ok(None),
        }
    }

    async fn set_json<T: serde::Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value).map_err(CacheError::from)?;
        self.set(key, &raw, ttl).await
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}
