//! Redis store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `REDIS_URL`: Redis connection string (default: `redis://localhost:6379`)
//! - `REDIS_SCAN_COUNT`: SCAN page size hint (default: 500)

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Scanner;
use futures::StreamExt;

use super::{KeyValueStore, StoreError};

/// Configuration for the Redis connection.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// COUNT hint passed to each SCAN page (default: 500).
    pub scan_count: u32,
}

impl RedisConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            scan_count: std::env::var("REDIS_SCAN_COUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(500),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            RedisErrorKind::IO | RedisErrorKind::Timeout | RedisErrorKind::Canceled => {
                Self::Unavailable(err.to_string())
            }
            _ => Self::Command(err.to_string()),
        }
    }
}

/// Redis-backed store.
///
/// Holds one client connection for the lifetime of the run.
pub struct RedisStore {
    client: RedisClient,
    scan_count: u32,
}

impl RedisStore {
    /// Connect with the given configuration.
    ///
    /// Fails with [`StoreError::Unavailable`] if the server cannot be reached.
    #[tracing::instrument(skip(config), name = "RedisStore::connect", fields(url = %config.url), err)]
    pub async fn connect(config: RedisConfig) -> Result<Self, StoreError> {
        let redis_config = fred::types::RedisConfig::from_url(&config.url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let client = RedisClient::new(redis_config, None, None, None);

        client.connect();
        client
            .wait_for_connect()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(scan_count = config.scan_count, "Redis connection established");

        Ok(Self {
            client,
            scan_count: config.scan_count,
        })
    }

    /// Connect using environment configuration.
    pub async fn from_env() -> Result<Self, StoreError> {
        Self::connect(RedisConfig::from_env()).await
    }

    /// Check if the server answers.
    pub async fn is_healthy(&self) -> bool {
        let pong: Result<(), RedisError> = self.client.ping().await;
        pong.is_ok()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        Ok(self.client.incr(key).await?)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let map: HashMap<String, String> = fields
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        let _: () = self.client.hset(key, map).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let fields: HashMap<String, String> = self.client.hgetall(key).await?;
        Ok(fields.into_iter().collect())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let len: i64 = self.client.rpush(key, value).await?;
        Ok(len.max(0) as u64)
    }

    async fn append_atomic(&self, lists: &[(&str, &str)], sets: &[(&str, &str)]) -> Result<(), StoreError> {
        let trx = self.client.multi();
        for (key, value) in lists {
            let _: () = trx.rpush(*key, *value).await?;
        }
        for (key, member) in sets {
            let _: () = trx.sadd(*key, *member).await?;
        }
        let _: () = trx.exec(true).await?;
        Ok(())
    }

    async fn lpush_trim(&self, key: &str, value: &str, capacity: NonZeroUsize) -> Result<(), StoreError> {
        let trx = self.client.multi();
        let _: () = trx.lpush(key, value).await?;
        let _: () = trx.ltrim(key, 0, capacity.get() as i64 - 1).await?;
        let _: () = trx.exec(true).await?;
        Ok(())
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.client.lrange(key, 0, -1).await?)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let _: () = self.client.sadd(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.client.smembers(key).await?)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut pages = self.client.scan(pattern, Some(self.scan_count), None);

        while let Some(page) = pages.next().await {
            let mut page = page?;
            if let Some(batch) = page.take_results() {
                keys.extend(batch.into_iter().filter_map(|k| k.into_string()));
            }
            page.next()?;
        }

        // SCAN may return a key more than once.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.quit().await?;
        tracing::info!("Redis connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_errors_are_unavailable() {
        for kind in [RedisErrorKind::IO, RedisErrorKind::Timeout, RedisErrorKind::Canceled] {
            let err: StoreError = RedisError::new(kind, "connection reset").into();
            assert!(err.is_unavailable(), "{err}");
        }
    }

    #[test]
    fn test_command_errors_are_not_unavailable() {
        let err: StoreError = RedisError::new(RedisErrorKind::Parse, "bad reply").into();
        assert!(matches!(err, StoreError::Command(_)));
        assert!(!err.is_unavailable());
    }
}
