//! # Redis search cache
//!
//! `SearchCache` on a deadpool-managed Redis pool. Values are stored as raw
//! bytes with `SET key value EX ttl`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::redis::AsyncCommands;
use deadpool_redis::{Config, Pool, Runtime};
use domains::{SearchCache, StoreError};

pub struct RedisSearchCache {
    pool: Pool,
}

fn redis_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::unavailable(format!("redis: {err}"))
}

impl RedisSearchCache {
    /// Creates the pool; connections are opened on first use.
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let pool = Config::from_url(redis_url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(redis_error)?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(redis_error)?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}

#[async_trait]
impl SearchCache for RedisSearchCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let mut conn = self.pool.get().await.map_err(redis_error)?;
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(redis_error)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(redis_error)?;
        // EX rejects 0, so sub-second TTLs round up to one second.
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value.to_vec(), seconds)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}
