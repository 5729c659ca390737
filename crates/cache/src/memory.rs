//! An in-memory [`Cache`] with real TTL expiry, used for unit tests and
//! `PLUGIN_ENGINE_ENV=development`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::{Cache, CacheResult};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}

#[derive(Default)]
pub struct InMemoryCache {
    table: Mutex<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut table = self.table.lock().unwrap();
        match table.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                table.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.table.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        self.table.lock().unwrap().remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl_on_create: Duration) -> CacheResult<i64> {
        let now = Instant::now();
        let mut table = self.table.lock().unwrap();
        let live = table.get(key).map(|e| e.is_live(now)).unwrap_or(false);
        if !live {
            table.insert(
                key.to_string(),
                Entry {
                    value: "1".to_string(),
                    expires_at: Some(now + ttl_on_create),
                },
            );
            return Ok(1);
        }
        let entry = table.get_mut(key).expect("checked live above");
        let next: i64 = entry.value.parse().unwrap_or(0) + 1;
        entry.value = next.to_string();
        Ok(next)
    }

    async fn get_counter(&self, key: &str) -> CacheResult<i64> {
        Ok(self
            .get(key)
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }
}
