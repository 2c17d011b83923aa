//! Performance benchmarks for fan-out writes and timeline reads.
//!
//! Run with: `cargo bench --bench fanout`
//!
//! | Operation | Scales with |
//! |-----------|-------------|
//! | Insert post | Follower count of the author |
//! | Retrieve timeline | Timeline capacity (hydration) |

use criterion::{
    black_box, criterion_group, criterion_main,
    BenchmarkId, Criterion, Throughput,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

use fanout_timeline::{FeedConfig, FeedEngine, InMemoryStore, UserId};

const AUTHOR: i64 = 0;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

/// Build an engine where `followers` users follow the author.
fn engine_with_followers(rt: &Runtime, followers: i64, config: FeedConfig) -> FeedEngine<InMemoryStore> {
    let engine = FeedEngine::new(Arc::new(InMemoryStore::new()), config);
    rt.block_on(async {
        for f in 1..=followers {
            engine
                .insert_edge(UserId::new(f), UserId::new(AUTHOR))
                .await
                .expect("edge");
        }
    });
    engine
}

/// Benchmark post insertion as the audience grows.
fn bench_insert_post(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("insert_post");

    for followers in [0, 10, 100, 1000] {
        let engine = engine_with_followers(&rt, followers, FeedConfig::default());

        group.throughput(Throughput::Elements(followers.max(1) as u64));
        group.bench_with_input(
            BenchmarkId::new("followers", followers),
            &engine,
            |b, engine| {
                b.iter(|| {
                    rt.block_on(engine.insert_post(UserId::new(AUTHOR), black_box("benchmark post")))
                        .expect("insert")
                })
            },
        );
    }

    group.finish();
}

/// Benchmark timeline hydration with and without the post cache.
fn bench_retrieve_timeline(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("retrieve_timeline");

    for (label, cache) in [("uncached", 0), ("cached", 1024)] {
        let engine = engine_with_followers(&rt, 1, FeedConfig::default().with_post_cache(cache));
        rt.block_on(async {
            for i in 0..20 {
                engine
                    .insert_post(UserId::new(AUTHOR), &format!("post {i}"))
                    .await
                    .expect("insert");
            }
        });

        group.throughput(Throughput::Elements(10));
        group.bench_function(label, |b| {
            b.iter(|| {
                rt.block_on(engine.retrieve_timeline(black_box(UserId::new(1))))
                    .expect("timeline")
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert_post, bench_retrieve_timeline);
criterion_main!(benches);
