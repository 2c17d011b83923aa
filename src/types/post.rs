//! Post types for the timeline engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::UserId;

/// Hash field holding the author's user id.
pub const FIELD_AUTHOR_ID: &str = "author_id";
/// Hash field holding the RFC 3339 creation timestamp.
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Hash field holding the post body.
pub const FIELD_TEXT: &str = "text";

/// Unique identifier for a post.
///
/// Issued by the identifier allocator from the store's atomic counter, so
/// ids are strictly increasing in issuance order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(i64);

impl PostId {
    /// Wrap a raw counter value.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Parse a post id from its stored decimal form.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok().map(Self)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PostId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

/// A post as submitted by an author, before an id is allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    /// Author of the post.
    pub author_id: UserId,
    /// Post body.
    pub text: String,
}

impl NewPost {
    /// Create a new unsaved post.
    pub fn new(author_id: UserId, text: impl Into<String>) -> Self {
        Self {
            author_id,
            text: text.into(),
        }
    }
}

/// Why a stored hash could not be read back as a [`Post`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PostRecordError {
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field is present but does not parse.
    #[error("invalid field `{field}`: {value:?}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Raw stored value.
        value: String,
    },
}

/// A stored post.
///
/// Immutable once written. The timestamp is assigned by the store layer at
/// write time, never supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Allocated id.
    pub id: PostId,
    /// Author of the post.
    pub author_id: UserId,
    /// Wall-clock creation time.
    pub timestamp: DateTime<Utc>,
    /// Post body.
    pub text: String,
}

impl Post {
    /// Create a post record.
    pub fn new(id: PostId, author_id: UserId, timestamp: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            id,
            author_id,
            timestamp,
            text: text.into(),
        }
    }

    /// Hash fields written under `post:<id>`.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            (FIELD_AUTHOR_ID, self.author_id.to_string()),
            (FIELD_TIMESTAMP, self.timestamp.to_rfc3339()),
            (FIELD_TEXT, self.text.clone()),
        ]
    }

    /// Rebuild a post from its hash fields.
    pub fn from_fields(id: PostId, fields: &BTreeMap<String, String>) -> Result<Self, PostRecordError> {
        let field = |name: &'static str| {
            fields
                .get(name)
                .ok_or(PostRecordError::MissingField(name))
        };

        let raw_author = field(FIELD_AUTHOR_ID)?;
        let author_id = UserId::parse(raw_author).ok_or_else(|| PostRecordError::InvalidField {
            field: FIELD_AUTHOR_ID,
            value: raw_author.clone(),
        })?;

        let raw_ts = field(FIELD_TIMESTAMP)?;
        let timestamp = DateTime::parse_from_rfc3339(raw_ts)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| PostRecordError::InvalidField {
                field: FIELD_TIMESTAMP,
                value: raw_ts.clone(),
            })?;

        let text = field(FIELD_TEXT)?.clone();

        Ok(Self {
            id,
            author_id,
            timestamp,
            text,
        })
    }
}
