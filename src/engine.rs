//! Timeline engine facade.
//!
//! Wires the allocator, graph, post store, fan-out writer and timeline
//! reader to one shared store handle. This is the surface ingestion and the
//! loader binary talk to.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::FeedConfig;
use crate::error::FeedResult;
use crate::fanout::{FanoutReport, FanoutWriter};
use crate::graph::GraphStore;
use crate::posts::{CacheStats, PostStore};
use crate::store::KeyValueStore;
use crate::timeline::TimelineReader;
use crate::types::{FollowEdge, Post, PostId, UserId};

/// A stored post together with its delivery outcome.
#[derive(Debug)]
pub struct InsertedPost {
    /// The stored post.
    pub post: Post,
    /// Fan-out result.
    pub fanout: FanoutReport,
}

/// Fan-out-on-write timeline engine.
///
/// Safe to share between tasks behind an `Arc`; every operation only needs
/// `&self`.
pub struct FeedEngine<S: KeyValueStore> {
    store: Arc<S>,
    graph: Arc<GraphStore<S>>,
    posts: Arc<PostStore<S>>,
    fanout: FanoutWriter<S>,
    timelines: TimelineReader<S>,
    config: FeedConfig,
}

impl<S: KeyValueStore> FeedEngine<S> {
    /// Build an engine over a store handle.
    pub fn new(store: Arc<S>, config: FeedConfig) -> Self {
        let graph = Arc::new(GraphStore::new(Arc::clone(&store), config.user_index));
        let posts = Arc::new(PostStore::new(Arc::clone(&store), config.post_cache_entries));
        let fanout = FanoutWriter::new(Arc::clone(&store), Arc::clone(&graph), config.timeline_capacity);
        let timelines = TimelineReader::new(Arc::clone(&store), Arc::clone(&posts), config.missing_posts);

        tracing::debug!(
            timeline_capacity = config.timeline_capacity.get(),
            user_index = ?graph.index(),
            missing_posts = ?config.missing_posts,
            "Feed engine initialized"
        );

        Self {
            store,
            graph,
            posts,
            fanout,
            timelines,
            config,
        }
    }

    /// Build an engine with default configuration.
    pub fn with_defaults(store: Arc<S>) -> Self {
        Self::new(store, FeedConfig::default())
    }

    /// Configuration in effect.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The follow graph.
    pub fn graph(&self) -> &GraphStore<S> {
        &self.graph
    }

    /// Store a post and push it onto every follower's timeline.
    ///
    /// The post stays stored even if some timeline writes fail; those
    /// failures are listed in the returned report.
    pub async fn insert_post(&self, author_id: UserId, text: &str) -> FeedResult<InsertedPost> {
        let post = self.posts.insert_post(author_id, text).await?;
        let fanout = self.fanout.fanout(author_id, post.id).await?;
        Ok(InsertedPost { post, fanout })
    }

    /// Record a follow edge.
    pub async fn insert_edge(&self, follower: UserId, followed: UserId) -> FeedResult<()> {
        self.graph.insert_edge(FollowEdge::new(follower, followed)).await
    }

    /// All users that follow someone.
    pub async fn enumerate_users(&self) -> FeedResult<BTreeSet<UserId>> {
        self.graph.enumerate_users().await
    }

    /// `user`'s timeline, newest first.
    pub async fn retrieve_timeline(&self, user: UserId) -> FeedResult<Vec<Post>> {
        self.timelines.retrieve_timeline(user).await
    }

    /// Post ids on `user`'s timeline, newest first.
    pub async fn timeline_ids(&self, user: UserId) -> FeedResult<Vec<PostId>> {
        self.timelines.timeline_ids(user).await
    }

    /// Fetch one post by id.
    pub async fn get_post(&self, id: PostId) -> FeedResult<Option<Post>> {
        self.posts.get_post(id).await
    }

    /// Hydrated-post cache statistics, if the cache is enabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.posts.cache_stats()
    }

    /// Release the store connection.
    pub async fn close(&self) -> FeedResult<()> {
        self.store.close().await?;
        tracing::debug!("Feed engine closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_post_reaches_follower() {
        let engine = FeedEngine::with_defaults(Arc::new(InMemoryStore::new()));
        engine.insert_edge(UserId::new(1), UserId::new(2)).await.unwrap();

        let inserted = engine.insert_post(UserId::new(2), "hello").await.unwrap();
        assert_eq!(inserted.fanout.delivered, 1);

        let timeline = engine.retrieve_timeline(UserId::new(1)).await.unwrap();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].id, inserted.post.id);
        assert_eq!(timeline[0].text, "hello");
    }

    #[tokio::test]
    async fn test_author_does_not_see_own_post() {
        let engine = FeedEngine::with_defaults(Arc::new(InMemoryStore::new()));
        engine.insert_edge(UserId::new(1), UserId::new(2)).await.unwrap();
        engine.insert_post(UserId::new(2), "hello").await.unwrap();

        assert!(engine.retrieve_timeline(UserId::new(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_capacity() {
        let engine = FeedEngine::new(
            Arc::new(InMemoryStore::new()),
            FeedConfig::default().with_capacity(std::num::NonZeroUsize::new(3).unwrap()),
        );
        engine.insert_edge(UserId::new(1), UserId::new(2)).await.unwrap();
        for i in 0..5 {
            engine.insert_post(UserId::new(2), &format!("post {i}")).await.unwrap();
        }

        assert_eq!(engine.timeline_ids(UserId::new(1)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_close_releases_store() {
        let store = Arc::new(InMemoryStore::new());
        let engine = FeedEngine::with_defaults(Arc::clone(&store));
        engine.close().await.unwrap();

        assert!(store.is_closed());
        assert!(engine.enumerate_users().await.unwrap_err().is_fatal());
    }
}
