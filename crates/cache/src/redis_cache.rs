//! Production [`Cache`] backed by Redis, using a `ConnectionManager` so a
//! dropped connection is transparently re-established rather than
//! failing every subsequent call (the same posture the teacher takes with
//! pooled `PgPool` connections).

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client};

use crate::{Cache, CacheError, CacheResult};

pub struct RedisCache {
    conn: redis::aio::ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| CacheError::Backend(e.into()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, secs)
                    .await
                    .map_err(|e| CacheError::Backend(e.into()))
            }
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| CacheError::Backend(e.into())),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| CacheError::Backend(e.into()))
    }

    async fn incr(&self, key: &str, ttl_on_create: Duration) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, 1).await.map_err(|e| CacheError::Backend(e.into()))?;
        if value == 1 {
            let secs = ttl_on_create.as_secs().max(1);
            let _: () = conn
                .expire(key, secs as i64)
                .await
                .map_err(|e| CacheError::Backend(e.into()))?;
        }
        Ok(value)
    }

    async fn get_counter(&self, key: &str) -> CacheResult<i64> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(key).await.map_err(|e| CacheError::Backend(e.into()))?;
        Ok(value.unwrap_or(0))
    }
}
