//! Timeline read-back and hydration.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};
use crate::keys;
use crate::posts::PostStore;
use crate::store::KeyValueStore;
use crate::types::{Post, PostId, UserId};

/// What to do when a timeline references a post with no stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPostPolicy {
    /// Log the dangling id and leave it out of the result.
    #[default]
    Skip,
    /// Fail the whole read with [`FeedError::MissingPost`].
    Fail,
}

impl MissingPostPolicy {
    /// Parse a policy from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "fail" => Some(Self::Fail),
            _ => None,
        }
    }
}

/// Reads timelines and hydrates them into posts.
pub struct TimelineReader<S: KeyValueStore> {
    store: Arc<S>,
    posts: Arc<PostStore<S>>,
    missing_posts: MissingPostPolicy,
}

impl<S: KeyValueStore> TimelineReader<S> {
    /// Create a reader.
    pub fn new(store: Arc<S>, posts: Arc<PostStore<S>>, missing_posts: MissingPostPolicy) -> Self {
        Self {
            store,
            posts,
            missing_posts,
        }
    }

    /// Post ids on `user`'s timeline, newest first.
    pub async fn timeline_ids(&self, user: UserId) -> FeedResult<Vec<PostId>> {
        let key = keys::timeline(user);
        let entries = self.store.lrange(&key).await?;
        entries
            .iter()
            .map(|entry| {
                PostId::parse(entry)
                    .ok_or_else(|| FeedError::corrupt(key.as_str(), format!("non-numeric post id {entry:?}")))
            })
            .collect()
    }

    /// `user`'s timeline as full posts, newest first.
    ///
    /// A user with no timeline gets an empty vector.
    pub async fn retrieve_timeline(&self, user: UserId) -> FeedResult<Vec<Post>> {
        let ids = self.timeline_ids(user).await?;
        let mut timeline = Vec::with_capacity(ids.len());

        for id in ids {
            match self.posts.get_post(id).await? {
                Some(post) => timeline.push(post),
                None => match self.missing_posts {
                    MissingPostPolicy::Skip => {
                        tracing::warn!(user_id = %user, post_id = %id, "Timeline references missing post");
                    }
                    MissingPostPolicy::Fail => return Err(FeedError::MissingPost(id)),
                },
            }
        }

        Ok(timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::DEFAULT_TIMELINE_CAPACITY;
    use crate::store::InMemoryStore;

    async fn setup(policy: MissingPostPolicy) -> (Arc<InMemoryStore>, Arc<PostStore<InMemoryStore>>, TimelineReader<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let posts = Arc::new(PostStore::new(Arc::clone(&store), 0));
        let reader = TimelineReader::new(Arc::clone(&store), Arc::clone(&posts), policy);
        (store, posts, reader)
    }

    #[tokio::test]
    async fn test_empty_timeline() {
        let (_, _, reader) = setup(MissingPostPolicy::Skip).await;
        assert!(reader.retrieve_timeline(UserId::new(42)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hydrates_in_list_order() {
        let (store, posts, reader) = setup(MissingPostPolicy::Skip).await;
        let first = posts.insert_post(UserId::new(2), "first").await.unwrap();
        let second = posts.insert_post(UserId::new(3), "second").await.unwrap();
        store.lpush_trim("timeline:1", &first.id.to_string(), DEFAULT_TIMELINE_CAPACITY).await.unwrap();
        store.lpush_trim("timeline:1", &second.id.to_string(), DEFAULT_TIMELINE_CAPACITY).await.unwrap();

        let timeline = reader.retrieve_timeline(UserId::new(1)).await.unwrap();
        let texts: Vec<_> = timeline.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_missing_post_skipped() {
        let (store, posts, reader) = setup(MissingPostPolicy::Skip).await;
        let post = posts.insert_post(UserId::new(2), "kept").await.unwrap();
        store.lpush_trim("timeline:1", &post.id.to_string(), DEFAULT_TIMELINE_CAPACITY).await.unwrap();
        store.lpush_trim("timeline:1", "999", DEFAULT_TIMELINE_CAPACITY).await.unwrap();

        let timeline = reader.retrieve_timeline(UserId::new(1)).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].id, post.id);
    }

    #[tokio::test]
    async fn test_missing_post_fails_read() {
        let (store, _, reader) = setup(MissingPostPolicy::Fail).await;
        store.lpush_trim("timeline:1", "999", DEFAULT_TIMELINE_CAPACITY).await.unwrap();

        let err = reader.retrieve_timeline(UserId::new(1)).await.unwrap_err();
        assert!(matches!(err, FeedError::MissingPost(id) if id == PostId::new(999)));
    }

    #[tokio::test]
    async fn test_non_numeric_entry_is_corrupt() {
        let (store, _, reader) = setup(MissingPostPolicy::Skip).await;
        store.lpush_trim("timeline:1", "post:1", DEFAULT_TIMELINE_CAPACITY).await.unwrap();

        assert!(matches!(
            reader.timeline_ids(UserId::new(1)).await,
            Err(FeedError::CorruptRecord { .. })
        ));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(MissingPostPolicy::from_str("SKIP"), Some(MissingPostPolicy::Skip));
        assert_eq!(MissingPostPolicy::from_str("fail"), Some(MissingPostPolicy::Fail));
        assert_eq!(MissingPostPolicy::from_str("retry"), None);
    }
}
