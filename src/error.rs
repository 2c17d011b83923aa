//! Error type shared by the timeline engine components.

use crate::store::StoreError;
use crate::types::{PostId, PostRecordError};

/// Error type for engine operations.
///
/// Only [`FeedError::StoreUnavailable`] is fatal to a run. Everything else
/// concerns one record or one operation, and the caller decides whether to
/// skip it or stop.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// A single store command failed.
    #[error("Store error: {0}")]
    Store(String),
    /// A timeline references a post with no stored record.
    #[error("Post not found: {0}")]
    MissingPost(PostId),
    /// A stored value could not be decoded.
    #[error("Corrupt record at {key}: {reason}")]
    CorruptRecord {
        /// Store key of the bad record.
        key: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl FeedError {
    /// True if the run should be aborted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Build a corrupt-record error.
    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a corrupt-record error from a post hash decode failure.
    pub fn corrupt_post(key: impl Into<String>, err: PostRecordError) -> Self {
        Self::corrupt(key, err)
    }
}

impl From<StoreError> for FeedError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            Self::StoreUnavailable(err.to_string())
        } else {
            Self::Store(err.to_string())
        }
    }
}

/// Result alias for engine operations.
pub type FeedResult<T> = Result<T, FeedError>;
