//! Store key layout.
//!
//! | Key | Type | Contents |
//! |-----|------|----------|
//! | `post:next_id` | counter | last allocated post id |
//! | `post:<id>` | hash | `author_id`, `timestamp`, `text` |
//! | `user_follows:<uid>` | list | ids this user follows |
//! | `user_followed_by:<uid>` | list | ids of this user's followers |
//! | `timeline:<uid>` | list | post ids, newest first |
//! | `users:known` | set | user ids, when the set index is in use |

use crate::types::{PostId, UserId};

/// Counter backing post id allocation.
pub const NEXT_POST_ID: &str = "post:next_id";

/// Secondary set of user ids for stores without key scans.
pub const KNOWN_USERS: &str = "users:known";

const POST_PREFIX: &str = "post:";
const FOLLOWS_PREFIX: &str = "user_follows:";
const FOLLOWED_BY_PREFIX: &str = "user_followed_by:";
const TIMELINE_PREFIX: &str = "timeline:";

/// Scan pattern matching every forward-list key.
pub const FOLLOWS_PATTERN: &str = "user_follows:*";

/// Hash key of a post.
pub fn post(id: PostId) -> String {
    format!("{POST_PREFIX}{id}")
}

/// Forward list: who `user` follows.
pub fn follows(user: UserId) -> String {
    format!("{FOLLOWS_PREFIX}{user}")
}

/// Reverse list: who follows `user`.
pub fn followed_by(user: UserId) -> String {
    format!("{FOLLOWED_BY_PREFIX}{user}")
}

/// Timeline list of `user`.
pub fn timeline(user: UserId) -> String {
    format!("{TIMELINE_PREFIX}{user}")
}

/// Recover the user id from a forward-list key.
///
/// Returns `None` for keys outside the forward-list namespace and for
/// suffixes that are not integers.
pub fn parse_follows(key: &str) -> Option<UserId> {
    key.strip_prefix(FOLLOWS_PREFIX).and_then(UserId::parse)
}

/// Resolve a reverse-list entry to the follower's id.
///
/// Entries are raw ids. Older writers stored the follower's forward-list key
/// instead, so that form is accepted too.
pub fn resolve_follower(entry: &str) -> Option<UserId> {
    UserId::parse(entry).or_else(|| parse_follows(entry))
}
