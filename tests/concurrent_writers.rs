//! Concurrency and bounded-list properties.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

use fanout_timeline::{FeedConfig, FeedEngine, InMemoryStore, PostId, UserId};
use proptest::prelude::*;

const WRITERS: usize = 8;
const POSTS_PER_WRITER: usize = 25;

fn user(id: i64) -> UserId {
    UserId::new(id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_get_distinct_ids() {
    let engine = Arc::new(FeedEngine::with_defaults(Arc::new(InMemoryStore::new())));

    let mut handles = Vec::new();
    for w in 0..WRITERS {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            for i in 0..POSTS_PER_WRITER {
                let inserted = engine
                    .insert_post(user(w as i64), &format!("writer {w} post {i}"))
                    .await
                    .unwrap();
                ids.push(inserted.post.id);
            }
            ids
        }));
    }

    let mut all = Vec::new();
    for handle in handles {
        let ids = handle.await.unwrap();
        // Each writer sees its own ids in increasing order.
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        all.extend(ids);
    }

    let distinct: BTreeSet<PostId> = all.iter().copied().collect();
    assert_eq!(distinct.len(), WRITERS * POSTS_PER_WRITER);
    let expected: BTreeSet<PostId> = (1..=(WRITERS * POSTS_PER_WRITER) as i64).map(PostId::new).collect();
    assert_eq!(distinct, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fanout_never_exceeds_capacity() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(FeedEngine::with_defaults(Arc::clone(&store)));

    // Follower 0 follows every writer, so all writers race on one timeline.
    for w in 1..=WRITERS as i64 {
        engine.insert_edge(user(0), user(w)).await.unwrap();
    }

    let mut handles = Vec::new();
    for w in 1..=WRITERS as i64 {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for i in 0..POSTS_PER_WRITER {
                engine.insert_post(user(w), &format!("{w}/{i}")).await.unwrap();
                assert!(store.list_len("timeline:0") <= 10);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids = engine.timeline_ids(user(0)).await.unwrap();
    assert_eq!(ids.len(), 10);
    let distinct: BTreeSet<_> = ids.iter().collect();
    assert_eq!(distinct.len(), 10);
}

fn timeline_after(posts: usize, capacity: usize) -> (Vec<PostId>, Vec<PostId>) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    runtime.block_on(async {
        let engine = FeedEngine::new(
            Arc::new(InMemoryStore::new()),
            FeedConfig::default().with_capacity(NonZeroUsize::new(capacity).unwrap()),
        );
        engine.insert_edge(user(1), user(2)).await.unwrap();

        let mut pushed = Vec::new();
        for i in 0..posts {
            pushed.push(engine.insert_post(user(2), &i.to_string()).await.unwrap().post.id);
        }
        (pushed, engine.timeline_ids(user(1)).await.unwrap())
    })
}

proptest! {
    #[test]
    fn prop_timeline_holds_most_recent(posts in 0usize..40, capacity in 1usize..15) {
        let (pushed, timeline) = timeline_after(posts, capacity);

        prop_assert_eq!(timeline.len(), posts.min(capacity));
        let expected: Vec<PostId> = pushed.iter().rev().take(capacity).copied().collect();
        prop_assert_eq!(timeline, expected);
    }
}
