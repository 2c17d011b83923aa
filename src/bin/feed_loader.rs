//! Feed Loader Binary
//!
//! Loads a follow graph and a post stream into the timeline engine, then
//! reads back every user's timeline, reporting how long each phase took.
//!
//! ## Configuration
//!
//! Environment variables (flags take precedence):
//! - `FEED_STORE`: `memory` or `redis` (default: memory)
//! - `REDIS_URL`: Redis connection string (default: redis://localhost:6379)
//! - `FEED_TIMELINE_CAPACITY`, `FEED_MISSING_POSTS`, `FEED_USER_INDEX`,
//!   `FEED_POST_CACHE_ENTRIES`: see `FeedConfig`
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: pretty)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin feed_loader --features cli,redis -- tweets.csv follows.csv --store redis
//! ```

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum, ValueHint};
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use fanout_timeline::ingest::{self, IngestReport};
use fanout_timeline::{FeedConfig, FeedEngine, InMemoryStore, KeyValueStore, MissingPostPolicy, UserId, UserIndex};

/// Store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    /// Process-local store, discarded on exit.
    Memory,
    /// Redis server at `--redis-url`.
    Redis,
}

/// Command-line arguments for the loader.
#[derive(Parser, Debug)]
#[command(author, version, about = "Load follows and posts, then read every timeline")]
struct Args {
    /// Posts CSV (`author_id,text` with a header row)
    #[arg(value_hint = ValueHint::FilePath)]
    posts: PathBuf,

    /// Follows CSV (`follower_id,followed_id` with a header row)
    #[arg(value_hint = ValueHint::FilePath)]
    follows: PathBuf,

    /// Store backend
    #[arg(long, value_enum, env = "FEED_STORE", default_value = "memory")]
    store: StoreKind,

    /// Redis connection string
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Post ids kept per timeline (at least 1)
    #[arg(long)]
    capacity: Option<NonZeroUsize>,

    /// Timeline entries whose post is gone: skip or fail
    #[arg(long, value_parser = parse_missing_posts)]
    missing_posts: Option<MissingPostPolicy>,

    /// Enumerate users via the known-users set instead of a key scan
    #[arg(long)]
    user_set: bool,

    /// Print this user's timeline as JSON after loading
    #[arg(long)]
    show: Option<i64>,
}

fn parse_missing_posts(s: &str) -> Result<MissingPostPolicy, String> {
    MissingPostPolicy::from_str(s).ok_or_else(|| format!("expected `skip` or `fail`, got {s:?}"))
}

impl Args {
    fn feed_config(&self) -> FeedConfig {
        let mut config = FeedConfig::from_env();
        if let Some(capacity) = self.capacity {
            config = config.with_capacity(capacity);
        }
        if let Some(policy) = self.missing_posts {
            config = config.with_missing_posts(policy);
        }
        if self.user_set {
            config = config.with_user_index(UserIndex::KnownUsersSet);
        }
        config
    }
}

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "feed_loader=info,fanout_timeline=info,fred=warn".into());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .flatten_event(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_span_events(FmtSpan::CLOSE))
            .init();
    }
}

fn open(path: &Path) -> Result<BufReader<File>, Box<dyn Error>> {
    let file = File::open(path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;
    Ok(BufReader::new(file))
}

fn print_duration(task: &str, started: Instant) {
    println!("{task} took {} milliseconds.", started.elapsed().as_millis());
}

/// Run every phase against an open engine.
async fn run<S: KeyValueStore>(engine: &FeedEngine<S>, args: &Args) -> Result<(), Box<dyn Error>> {
    let follows = ingest::parse_follows(open(&args.follows)?)?;
    let report: IngestReport = ingest::load_follows(engine, follows)
        .instrument(info_span!("load_follows"))
        .await?;
    info!(edges = report.inserted, "Follow graph loaded");

    let posts = ingest::parse_posts(open(&args.posts)?)?;
    let started = Instant::now();
    ingest::load_posts(engine, posts)
        .instrument(info_span!("load_posts"))
        .await?;
    print_duration("Saving tweets", started);

    let started = Instant::now();
    ingest::read_all_timelines(engine)
        .instrument(info_span!("read_timelines"))
        .await?;
    print_duration("Retrieving timelines", started);

    if let Some(user) = args.show {
        let timeline = engine.retrieve_timeline(UserId::new(user)).await?;
        println!("{}", serde_json::to_string_pretty(&timeline)?);
    }

    if let Some(stats) = engine.cache_stats() {
        info!(hits = stats.hits, misses = stats.misses, entries = stats.entries, "Post cache");
    }

    Ok(())
}

/// Run, then release the store whether or not the run succeeded.
async fn run_and_close<S: KeyValueStore>(store: S, args: &Args) -> Result<(), Box<dyn Error>> {
    let engine = FeedEngine::new(Arc::new(store), args.feed_config());
    let outcome = run(&engine, args).await;

    if let Err(e) = engine.close().await {
        tracing::error!(error = %e, "Failed to close store");
    }
    outcome
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("feed_loader", run_id = %run_id, store = ?args.store);

    async move {
        info!(version = env!("CARGO_PKG_VERSION"), "Starting feed loader");

        match args.store {
            StoreKind::Memory => run_and_close(InMemoryStore::new(), &args).await?,
            StoreKind::Redis => connect_redis_and_run(&args).await?,
        }

        info!("Feed loader finished");
        Ok::<(), Box<dyn Error>>(())
    }
    .instrument(span)
    .await
}

#[cfg(feature = "redis")]
async fn connect_redis_and_run(args: &Args) -> Result<(), Box<dyn Error>> {
    use fanout_timeline::{RedisConfig, RedisStore};

    let mut config = RedisConfig::from_env();
    if let Some(url) = &args.redis_url {
        config.url = url.clone();
    }

    let connect_start = Instant::now();
    let store = match RedisStore::connect(config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to Redis");
            return Err(e.into());
        }
    };
    info!(latency_ms = connect_start.elapsed().as_millis() as u64, "Connected to Redis");

    run_and_close(store, args).await
}

#[cfg(not(feature = "redis"))]
async fn connect_redis_and_run(_args: &Args) -> Result<(), Box<dyn Error>> {
    Err("this build has no Redis support; rebuild with `--features redis`".into())
}
