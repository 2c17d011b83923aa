//! CSV ingestion of follows and posts.
//!
//! Input files carry a header row, which is skipped.
//!
//! - Follows: `follower_id,followed_id`
//! - Posts: `author_id,text`, where the text is everything after the first comma
//!
//! Malformed rows are reported per line and skipped. During loading, a
//! record whose store operation fails is logged and counted, and the run
//! moves on; only a fatal error (store gone) stops it.

use std::io::BufRead;

use crate::engine::FeedEngine;
use crate::error::FeedError;
use crate::store::KeyValueStore;
use crate::types::{FollowEdge, NewPost, UserId};

/// A row that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number in the source file.
    pub line: usize,
    /// What was wrong with the row.
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

/// One parsed row, or the reason it was rejected.
pub type Row<T> = Result<T, ParseError>;

fn parse_user(line: usize, field: &str, what: &str) -> Row<UserId> {
    let field = field.trim();
    UserId::parse(field).ok_or_else(|| ParseError::new(line, format!("invalid {what} {field:?}")))
}

/// Parse one follows row.
pub fn parse_follow_row(line: usize, row: &str) -> Row<FollowEdge> {
    let mut fields = row.split(',');
    let follower = fields
        .next()
        .ok_or_else(|| ParseError::new(line, "missing follower id"))?;
    let followed = fields
        .next()
        .ok_or_else(|| ParseError::new(line, "missing followed id"))?;

    Ok(FollowEdge::new(
        parse_user(line, follower, "follower id")?,
        parse_user(line, followed, "followed id")?,
    ))
}

/// Parse one posts row.
pub fn parse_post_row(line: usize, row: &str) -> Row<NewPost> {
    let (author, text) = row
        .split_once(',')
        .ok_or_else(|| ParseError::new(line, "missing post text"))?;
    Ok(NewPost::new(parse_user(line, author, "author id")?, text))
}

fn parse_rows<R, T>(reader: R, parse: impl Fn(usize, &str) -> Row<T>) -> std::io::Result<Vec<Row<T>>>
where
    R: BufRead,
{
    let mut rows = Vec::new();
    // Line 1 is the header.
    for (idx, line) in reader.lines().enumerate().skip(1) {
        let line = line?;
        let row = line.trim_end_matches('\r');
        if row.trim().is_empty() {
            continue;
        }
        rows.push(parse(idx + 1, row));
    }
    Ok(rows)
}

/// Parse a follows CSV.
pub fn parse_follows<R: BufRead>(reader: R) -> std::io::Result<Vec<Row<FollowEdge>>> {
    parse_rows(reader, parse_follow_row)
}

/// Parse a posts CSV.
pub fn parse_posts<R: BufRead>(reader: R) -> std::io::Result<Vec<Row<NewPost>>> {
    parse_rows(reader, parse_post_row)
}

/// Counters for one load phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Records written.
    pub inserted: usize,
    /// Rows rejected by the parser.
    pub skipped_rows: usize,
    /// Records whose store operation failed.
    pub failed: usize,
    /// Posts stored but not delivered to every follower.
    pub partial_fanouts: usize,
}

/// Counters for a full timeline read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimelineSweep {
    /// Users whose timeline was read.
    pub users: usize,
    /// Posts hydrated across all timelines.
    pub posts: usize,
    /// Timelines that could not be read.
    pub failed: usize,
}

fn note_parse_error(phase: &str, err: &ParseError, report: &mut IngestReport) {
    tracing::warn!(phase, line = err.line, reason = %err.reason, "Skipping malformed row");
    report.skipped_rows += 1;
}

fn note_failure(err: FeedError, report: &mut IngestReport) -> Result<(), FeedError> {
    if err.is_fatal() {
        return Err(err);
    }
    report.failed += 1;
    Ok(())
}

/// Insert parsed follow edges.
///
/// Returns `Err` only for fatal errors.
pub async fn load_follows<S: KeyValueStore>(
    engine: &FeedEngine<S>,
    rows: Vec<Row<FollowEdge>>,
) -> Result<IngestReport, FeedError> {
    let mut report = IngestReport::default();
    for row in rows {
        let edge = match row {
            Ok(edge) => edge,
            Err(e) => {
                note_parse_error("follows", &e, &mut report);
                continue;
            }
        };
        match engine.insert_edge(edge.follower, edge.followed).await {
            Ok(()) => report.inserted += 1,
            Err(e) => {
                tracing::error!(edge = %edge, error = %e, "Error inserting follows");
                note_failure(e, &mut report)?;
            }
        }
    }
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped_rows,
        failed = report.failed,
        "Follows loaded"
    );
    Ok(report)
}

/// Insert parsed posts, fanning each out as it is stored.
///
/// Returns `Err` only for fatal errors.
pub async fn load_posts<S: KeyValueStore>(
    engine: &FeedEngine<S>,
    rows: Vec<Row<NewPost>>,
) -> Result<IngestReport, FeedError> {
    let mut report = IngestReport::default();
    for row in rows {
        let post = match row {
            Ok(post) => post,
            Err(e) => {
                note_parse_error("posts", &e, &mut report);
                continue;
            }
        };
        match engine.insert_post(post.author_id, &post.text).await {
            Ok(inserted) => {
                report.inserted += 1;
                if !inserted.fanout.is_complete() {
                    report.partial_fanouts += 1;
                }
            }
            Err(e) => {
                tracing::error!(author_id = %post.author_id, error = %e, "Error inserting post");
                note_failure(e, &mut report)?;
            }
        }
    }
    tracing::info!(
        inserted = report.inserted,
        skipped = report.skipped_rows,
        failed = report.failed,
        partial_fanouts = report.partial_fanouts,
        "Posts loaded"
    );
    Ok(report)
}

/// Read and hydrate the timeline of every known user.
pub async fn read_all_timelines<S: KeyValueStore>(engine: &FeedEngine<S>) -> Result<TimelineSweep, FeedError> {
    let users = engine.enumerate_users().await?;
    let mut sweep = TimelineSweep::default();

    for user in users {
        match engine.retrieve_timeline(user).await {
            Ok(timeline) => {
                sweep.users += 1;
                sweep.posts += timeline.len();
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(user_id = %user, error = %e, "Error retrieving timeline");
                sweep.failed += 1;
            }
        }
    }

    tracing::info!(users = sweep.users, posts = sweep.posts, failed = sweep.failed, "Timelines read");
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_follows_skip_header_and_blank_lines() {
        let csv = "USER_ID,FOLLOWS_ID\n1,2\n\n3, 4\r\n";
        let rows = parse_follows(Cursor::new(csv)).unwrap();

        assert_eq!(
            rows,
            vec![
                Ok(FollowEdge::new(UserId::new(1), UserId::new(2))),
                Ok(FollowEdge::new(UserId::new(3), UserId::new(4))),
            ]
        );
    }

    #[test]
    fn test_malformed_follow_rows() {
        let csv = "h\nx,2\n5\n";
        let rows = parse_follows(Cursor::new(csv)).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap_err().line, 2);
        assert_eq!(rows[1].as_ref().unwrap_err().line, 3);
    }

    #[test]
    fn test_post_text_keeps_commas() {
        let csv = "USER_ID,TWEET_TEXT\n7,hello, world\n";
        let rows = parse_posts(Cursor::new(csv)).unwrap();

        assert_eq!(rows, vec![Ok(NewPost::new(UserId::new(7), "hello, world"))]);
    }

    #[test]
    fn test_padded_author_id() {
        let rows = parse_posts(Cursor::new("h\n 7 ,hi\n")).unwrap();
        assert_eq!(rows, vec![Ok(NewPost::new(UserId::new(7), "hi"))]);
    }

    #[test]
    fn test_post_without_text() {
        let rows = parse_posts(Cursor::new("h\n7\n")).unwrap();
        assert!(rows[0].is_err());
    }

    #[test]
    fn test_header_only() {
        assert!(parse_posts(Cursor::new("USER_ID,TWEET_TEXT\n")).unwrap().is_empty());
        assert!(parse_follows(Cursor::new("")).unwrap().is_empty());
    }
}
