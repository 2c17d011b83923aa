//! Engine configuration.
//!
//! ## Environment
//!
//! - `FEED_TIMELINE_CAPACITY`: ids kept per timeline, at least 1 (default: 10)
//! - `FEED_MISSING_POSTS`: `skip` or `fail` (default: skip)
//! - `FEED_USER_INDEX`: `scan` or `set` (default: scan)
//! - `FEED_POST_CACHE_ENTRIES`: hydrated-post cache size, 0 disables (default: 10000)

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::fanout::DEFAULT_TIMELINE_CAPACITY;
use crate::graph::UserIndex;
use crate::timeline::MissingPostPolicy;

/// Configuration for [`crate::FeedEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Maximum post ids kept per timeline (default: 10).
    pub timeline_capacity: NonZeroUsize,
    /// Handling of timeline entries whose post is gone (default: skip).
    pub missing_posts: MissingPostPolicy,
    /// How known users are enumerated (default: scan).
    pub user_index: UserIndex,
    /// Hydrated-post LRU size; 0 disables the cache (default: 10000).
    pub post_cache_entries: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            timeline_capacity: DEFAULT_TIMELINE_CAPACITY,
            missing_posts: MissingPostPolicy::default(),
            user_index: UserIndex::default(),
            post_cache_entries: 10_000,
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timeline_capacity: std::env::var("FEED_TIMELINE_CAPACITY")
                .ok()
                .and_then(|s| parse_capacity(&s))
                .unwrap_or(defaults.timeline_capacity),
            missing_posts: std::env::var("FEED_MISSING_POSTS")
                .ok()
                .and_then(|s| MissingPostPolicy::from_str(&s))
                .unwrap_or(defaults.missing_posts),
            user_index: std::env::var("FEED_USER_INDEX")
                .ok()
                .and_then(|s| UserIndex::from_str(&s))
                .unwrap_or(defaults.user_index),
            post_cache_entries: std::env::var("FEED_POST_CACHE_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.post_cache_entries),
        }
    }

    /// Set the timeline capacity.
    pub fn with_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.timeline_capacity = capacity;
        self
    }

    /// Set the missing-post policy.
    pub fn with_missing_posts(mut self, policy: MissingPostPolicy) -> Self {
        self.missing_posts = policy;
        self
    }

    /// Set the user index mode.
    pub fn with_user_index(mut self, index: UserIndex) -> Self {
        self.user_index = index;
        self
    }

    /// Set the post cache size.
    pub fn with_post_cache(mut self, entries: usize) -> Self {
        self.post_cache_entries = entries;
        self
    }
}

/// Parse a timeline capacity. Zero and non-numeric values are rejected.
pub fn parse_capacity(s: &str) -> Option<NonZeroUsize> {
    let parsed = s.trim().parse::<NonZeroUsize>().ok();
    if parsed.is_none() {
        tracing::warn!(value = %s, "Ignoring invalid timeline capacity, must be a positive integer");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.timeline_capacity.get(), 10);
        assert_eq!(config.missing_posts, MissingPostPolicy::Skip);
        assert_eq!(config.user_index, UserIndex::Scan);
    }

    #[test]
    fn test_builders() {
        let config = FeedConfig::default()
            .with_capacity(NonZeroUsize::new(3).unwrap())
            .with_missing_posts(MissingPostPolicy::Fail)
            .with_user_index(UserIndex::KnownUsersSet)
            .with_post_cache(0);
        assert_eq!(config.timeline_capacity.get(), 3);
        assert_eq!(config.missing_posts, MissingPostPolicy::Fail);
        assert_eq!(config.user_index, UserIndex::KnownUsersSet);
        assert_eq!(config.post_cache_entries, 0);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(parse_capacity("0"), None);
        assert_eq!(parse_capacity("-1"), None);
        assert_eq!(parse_capacity("ten"), None);
        assert_eq!(parse_capacity("25"), NonZeroUsize::new(25));
    }

    #[test]
    fn test_zero_capacity_rejected_on_deserialize() {
        let json = r#"{"timeline_capacity":0,"missing_posts":"skip","user_index":"scan","post_cache_entries":0}"#;
        assert!(serde_json::from_str::<FeedConfig>(json).is_err());

        let json = json.replace("\"timeline_capacity\":0", "\"timeline_capacity\":4");
        let config: FeedConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.timeline_capacity.get(), 4);
    }
}
