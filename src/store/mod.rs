//! Key-value store backends.
//!
//! The timeline engine needs a small operation set from its store: an
//! atomic counter, hash records, ordered lists, sets, and key scans. Any
//! backend offering these can host the engine.

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use async_trait::async_trait;

/// Error type for store operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected or failed a single command.
    #[error("Store command failed: {0}")]
    Command(String),
    /// The handle was closed.
    #[error("Store connection closed")]
    Closed,
}

impl StoreError {
    /// True if the failure means the store is gone, not just one command.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Closed)
    }
}

/// Trait for key-value storage backends.
///
/// Every method is a single logical command. `lpush_trim` and `append_atomic`
/// must apply all of their writes as one atomic unit.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomically increment the counter at `key` and return the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set fields of the hash at `key`.
    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    /// Fetch all fields of the hash at `key` (empty if absent).
    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError>;

    /// Append `value` to the tail of the list at `key`, returning the new length.
    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Append `(key, value)` pairs to lists and add `(key, member)` pairs to
    /// sets, all as one transaction: either every write lands or none does.
    async fn append_atomic(&self, lists: &[(&str, &str)], sets: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Push `value` onto the head of the list at `key`, then keep only the
    /// first `capacity` elements. Both steps form one atomic unit.
    async fn lpush_trim(&self, key: &str, value: &str, capacity: NonZeroUsize) -> Result<(), StoreError>;

    /// Fetch the whole list at `key`, head to tail (empty if absent).
    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Add `member` to the set at `key`.
    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// Fetch the members of the set at `key` (empty if absent).
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Enumerate keys matching a glob `pattern`.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Whether `scan` is supported by this backend.
    fn supports_scan(&self) -> bool {
        true
    }

    /// Release the connection. Later commands fail with [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

pub use memory::InMemoryStore;

#[cfg(feature = "redis")]
pub use self::redis::{RedisConfig, RedisStore};
