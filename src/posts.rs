//! Post persistence.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;

use crate::allocator::IdentifierAllocator;
use crate::error::{FeedError, FeedResult};
use crate::keys;
use crate::store::KeyValueStore;
use crate::types::{Post, PostId, UserId};

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the store.
    pub misses: u64,
    /// Entries currently cached.
    pub entries: usize,
}

/// LRU cache of hydrated posts.
///
/// Posts never change after they are written, so cached entries are never
/// invalidated, only evicted.
struct PostCache {
    entries: Mutex<LruCache<PostId, Post>>,
    stats: Mutex<CacheStats>,
}

impl PostCache {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    fn get(&self, id: PostId) -> Option<Post> {
        let hit = self.entries.lock().get(&id).cloned();
        let mut stats = self.stats.lock();
        if hit.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        hit
    }

    fn put(&self, post: Post) {
        self.entries.lock().put(post.id, post);
    }

    fn stats(&self) -> CacheStats {
        let counted = *self.stats.lock();
        CacheStats {
            entries: self.entries.lock().len(),
            ..counted
        }
    }
}

/// Stores posts as hashes under `post:<id>`.
pub struct PostStore<S: KeyValueStore> {
    store: Arc<S>,
    allocator: IdentifierAllocator<S>,
    cache: Option<PostCache>,
}

impl<S: KeyValueStore> PostStore<S> {
    /// Create a post store. A `cache_entries` of 0 disables the post cache.
    pub fn new(store: Arc<S>, cache_entries: usize) -> Self {
        Self {
            allocator: IdentifierAllocator::new(Arc::clone(&store)),
            store,
            cache: NonZeroUsize::new(cache_entries).map(PostCache::new),
        }
    }

    /// Allocate an id and persist a new post, timestamped now.
    pub async fn insert_post(&self, author_id: UserId, text: &str) -> FeedResult<Post> {
        let id = self.allocator.next_id().await?;
        let post = Post::new(id, author_id, Utc::now(), text);

        self.store.hset(&keys::post(id), &post.to_fields()).await?;

        tracing::debug!(post_id = %id, author_id = %author_id, "Stored post");
        Ok(post)
    }

    /// Fetch a post by id.
    ///
    /// Returns `None` when nothing is stored under the id.
    pub async fn get_post(&self, id: PostId) -> FeedResult<Option<Post>> {
        if let Some(post) = self.cache.as_ref().and_then(|c| c.get(id)) {
            return Ok(Some(post));
        }

        let key = keys::post(id);
        let fields = self.store.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let post = Post::from_fields(id, &fields).map_err(|e| FeedError::corrupt_post(key, e))?;
        if let Some(cache) = &self.cache {
            cache.put(post.clone());
        }
        Ok(Some(post))
    }

    /// Post cache statistics, if the cache is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PostCache::stats)
    }
}
