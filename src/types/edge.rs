//! Follow edges of the social graph.

use serde::{Deserialize, Serialize};
use super::user::UserId;

/// Directed follow edge: `follower` follows `followed`.
///
/// Implements `Ord` for deterministic ordering: (follower, followed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FollowEdge {
    /// User doing the following.
    pub follower: UserId,
    /// User being followed.
    pub followed: UserId,
}

impl FollowEdge {
    /// Create a new edge.
    pub fn new(follower: UserId, followed: UserId) -> Self {
        Self { follower, followed }
    }
}

impl std::fmt::Display for FollowEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.follower, self.followed)
    }
}
