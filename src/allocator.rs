//! Post id allocation.

use std::sync::Arc;

use crate::error::FeedResult;
use crate::keys;
use crate::store::KeyValueStore;
use crate::types::PostId;

/// Issues unique, strictly increasing post ids from the store's atomic counter.
///
/// Any number of allocators may share one counter; the store serializes the
/// increments, so ids stay unique and totally ordered across callers.
pub struct IdentifierAllocator<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> IdentifierAllocator<S> {
    /// Create an allocator over a shared store handle.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Allocate the next post id.
    ///
    /// There is no local fallback: if the counter cannot be incremented the
    /// error is returned as-is.
    pub async fn next_id(&self) -> FeedResult<PostId> {
        let raw = self.store.incr(keys::NEXT_POST_ID).await?;
        tracing::trace!(post_id = raw, "Allocated post id");
        Ok(PostId::new(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let allocator = IdentifierAllocator::new(Arc::new(InMemoryStore::new()));

        let mut last = PostId::new(0);
        for _ in 0..20 {
            let id = allocator.next_id().await.unwrap();
            assert!(id > last);
            last = id;
        }
        assert_eq!(last, PostId::new(20));
    }

    #[tokio::test]
    async fn test_allocators_share_counter() {
        let store = Arc::new(InMemoryStore::new());
        let a = IdentifierAllocator::new(Arc::clone(&store));
        let b = IdentifierAllocator::new(Arc::clone(&store));

        let first = a.next_id().await.unwrap();
        let second = b.next_id().await.unwrap();
        assert!(second > first);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal() {
        let store = Arc::new(InMemoryStore::new());
        store.close().await.unwrap();
        let allocator = IdentifierAllocator::new(store);

        let err = allocator.next_id().await.unwrap_err();
        assert!(err.is_fatal());
    }
}
