//! Fan-out-on-write delivery of new posts to follower timelines.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::error::FeedError;
use crate::graph::GraphStore;
use crate::store::KeyValueStore;
use crate::types::{PostId, UserId};

/// Default number of post ids kept per timeline.
pub const DEFAULT_TIMELINE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(10) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

/// Outcome of delivering one post.
#[derive(Debug, Default)]
pub struct FanoutReport {
    /// Timelines the post was pushed onto.
    pub delivered: usize,
    /// Timeline keys whose write failed.
    pub failed: Vec<(String, FeedError)>,
}

impl FanoutReport {
    /// True if every follower received the post.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of followers the post was addressed to.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Pushes post ids onto follower timelines, keeping each bounded.
pub struct FanoutWriter<S: KeyValueStore> {
    store: Arc<S>,
    graph: Arc<GraphStore<S>>,
    capacity: NonZeroUsize,
}

impl<S: KeyValueStore> FanoutWriter<S> {
    /// Create a writer bounding timelines to `capacity` entries.
    pub fn new(store: Arc<S>, graph: Arc<GraphStore<S>>, capacity: NonZeroUsize) -> Self {
        Self { store, graph, capacity }
    }

    /// Timeline capacity.
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Deliver `post_id` to every follower of `author_id`.
    ///
    /// Each delivery is an atomic push-then-trim, so a timeline never holds
    /// more than `capacity` ids even with concurrent writers. A failed
    /// delivery is recorded and the remaining followers are still served,
    /// unless the store itself is gone.
    pub async fn fanout(&self, author_id: UserId, post_id: PostId) -> Result<FanoutReport, FeedError> {
        let timelines = self.graph.follower_keys(author_id).await?;
        let value = post_id.to_string();
        let mut report = FanoutReport::default();

        for timeline in timelines {
            match self.store.lpush_trim(&timeline, &value, self.capacity).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    let err = FeedError::from(e);
                    if err.is_fatal() {
                        return Err(err);
                    }
                    tracing::warn!(
                        post_id = %post_id,
                        timeline = %timeline,
                        error = %err,
                        "Timeline write failed"
                    );
                    report.failed.push((timeline, err));
                }
            }
        }

        tracing::debug!(
            post_id = %post_id,
            author_id = %author_id,
            delivered = report.delivered,
            failed = report.failed.len(),
            "Fan-out complete"
        );
        Ok(report)
    }
}
