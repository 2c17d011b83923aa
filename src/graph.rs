//! Follow graph storage.
//!
//! Each edge is written to two lists: the follower's forward list
//! (`user_follows:<follower>`) and the followed user's reverse list
//! (`user_followed_by:<followed>`). Both appends, and the known-users set
//! add when that index is on, go out as one transaction, so a failed insert
//! never leaves half an edge behind.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FeedResult;
use crate::keys;
use crate::store::KeyValueStore;
use crate::types::{FollowEdge, UserId};

/// How the set of known users is discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIndex {
    /// Scan forward-list keys and parse the id suffix.
    #[default]
    Scan,
    /// Maintain an explicit set of user ids, updated on every edge insert.
    KnownUsersSet,
}

impl UserIndex {
    /// Parse an index mode from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "scan" => Some(Self::Scan),
            "set" | "known_users_set" => Some(Self::KnownUsersSet),
            _ => None,
        }
    }
}

/// Follow graph over a shared store handle.
pub struct GraphStore<S: KeyValueStore> {
    store: Arc<S>,
    index: UserIndex,
}

impl<S: KeyValueStore> GraphStore<S> {
    /// Create a graph store.
    ///
    /// A backend without key scans always uses [`UserIndex::KnownUsersSet`].
    pub fn new(store: Arc<S>, index: UserIndex) -> Self {
        let index = if index == UserIndex::Scan && !store.supports_scan() {
            tracing::info!("Store has no key scan, falling back to known-users set");
            UserIndex::KnownUsersSet
        } else {
            index
        };
        Self { store, index }
    }

    /// Index mode in effect.
    pub fn index(&self) -> UserIndex {
        self.index
    }

    /// Record that `edge.follower` follows `edge.followed`.
    ///
    /// Duplicate edges are not collapsed; inserting the same edge twice
    /// appends it twice.
    pub async fn insert_edge(&self, edge: FollowEdge) -> FeedResult<()> {
        let forward_key = keys::follows(edge.follower);
        let reverse_key = keys::followed_by(edge.followed);
        let followed = edge.followed.to_string();
        let follower = edge.follower.to_string();

        let lists = [
            (forward_key.as_str(), followed.as_str()),
            (reverse_key.as_str(), follower.as_str()),
        ];
        let known_user = [(keys::KNOWN_USERS, follower.as_str())];
        let sets: &[(&str, &str)] = match self.index {
            UserIndex::KnownUsersSet => &known_user,
            UserIndex::Scan => &[],
        };
        self.store.append_atomic(&lists, sets).await?;

        tracing::trace!(follower = %edge.follower, followed = %edge.followed, "Inserted follow edge");
        Ok(())
    }

    /// Ids of the users following `user`, in insertion order.
    ///
    /// Entries that do not resolve to an id are logged and skipped.
    pub async fn followers(&self, user: UserId) -> FeedResult<Vec<UserId>> {
        let entries = self.store.lrange(&keys::followed_by(user)).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                let resolved = keys::resolve_follower(entry);
                if resolved.is_none() {
                    tracing::warn!(user_id = %user, entry = %entry, "Unresolvable follower entry");
                }
                resolved
            })
            .collect())
    }

    /// Timeline keys of the users following `user`.
    pub async fn follower_keys(&self, user: UserId) -> FeedResult<Vec<String>> {
        Ok(self
            .followers(user)
            .await?
            .into_iter()
            .map(keys::timeline)
            .collect())
    }

    /// Ids `user` follows, in insertion order.
    pub async fn following(&self, user: UserId) -> FeedResult<Vec<UserId>> {
        let entries = self.store.lrange(&keys::follows(user)).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| UserId::parse(entry))
            .collect())
    }

    /// All users that follow someone.
    pub async fn enumerate_users(&self) -> FeedResult<BTreeSet<UserId>> {
        let users = match self.index {
            UserIndex::Scan => {
                let matched = self.store.scan(keys::FOLLOWS_PATTERN).await?;
                matched
                    .iter()
                    .filter_map(|key| {
                        let user = keys::parse_follows(key);
                        if user.is_none() {
                            tracing::warn!(key = %key, "Error parsing user id from key");
                        }
                        user
                    })
                    .collect()
            }
            UserIndex::KnownUsersSet => {
                let members = self.store.smembers(keys::KNOWN_USERS).await?;
                members
                    .iter()
                    .filter_map(|member| {
                        let user = UserId::parse(member);
                        if user.is_none() {
                            tracing::warn!(member = %member, "Error parsing user id from known-users set");
                        }
                        user
                    })
                    .collect()
            }
        };
        Ok(users)
    }
}
