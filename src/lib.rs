//! # fanout-timeline
//!
//! Fan-out-on-write timelines over a key-value store.
//!
//! The engine answers one question:
//!
//! > What are the most recent posts from the people this user follows?
//!
//! It answers it at write time: every new post is pushed onto each
//! follower's timeline, and each timeline is trimmed to a fixed capacity.
//! Reading a timeline is then a single list read plus hydration.
//!
//! ## Architecture
//!
//! ```text
//! insert_post → IdentifierAllocator → PostStore → FanoutWriter
//!                                                     ↓
//!                                     GraphStore (reverse edges)
//!
//! retrieve_timeline → TimelineReader → PostStore
//!                          ↓
//!                  KeyValueStore (Redis or Memory)
//! ```
//!
//! ## Guarantees
//!
//! - Post ids are unique and strictly increasing across concurrent writers
//! - A timeline never holds more than its capacity, newest post at the head
//! - A follow edge is written to both indexes or to neither

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod keys;
pub mod store;
pub mod error;
pub mod config;
pub mod allocator;
pub mod graph;
pub mod posts;
pub mod fanout;
pub mod timeline;
pub mod engine;
pub mod ingest;

// Re-exports
pub use types::{FollowEdge, NewPost, Post, PostId, PostRecordError, UserId};
pub use store::{InMemoryStore, KeyValueStore, StoreError};
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
pub use error::{FeedError, FeedResult};
pub use config::FeedConfig;
pub use allocator::IdentifierAllocator;
pub use graph::{GraphStore, UserIndex};
pub use posts::{CacheStats, PostStore};
pub use fanout::{FanoutReport, FanoutWriter, DEFAULT_TIMELINE_CAPACITY};
pub use timeline::{MissingPostPolicy, TimelineReader};
pub use engine::{FeedEngine, InsertedPost};
pub use ingest::{IngestReport, ParseError, TimelineSweep};
