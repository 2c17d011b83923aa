//! User identifiers.
//!
//! Users have no stored record of their own; a user exists once it appears
//! on either side of a follow edge.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer identifier of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Wrap a raw id.
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Parse a user id from its decimal form. Surrounding whitespace is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok().map(Self)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}
