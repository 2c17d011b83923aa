//! In-memory key-value store for testing and local runs.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::num::NonZeroUsize;
use async_trait::async_trait;
use parking_lot::Mutex;
use regex_lite::Regex;

use super::{KeyValueStore, StoreError};

/// Keyspace of the in-memory store.
///
/// Uses BTreeMap/BTreeSet for deterministic scan order.
#[derive(Debug, Default)]
struct Keyspace {
    counters: BTreeMap<String, i64>,
    hashes: BTreeMap<String, BTreeMap<String, String>>,
    lists: BTreeMap<String, VecDeque<String>>,
    sets: BTreeMap<String, BTreeSet<String>>,
    closed: bool,
    /// Writes to keys starting with this prefix fail.
    failing_prefix: Option<String>,
}

impl Keyspace {
    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn check_write(&self, key: &str) -> Result<(), StoreError> {
        self.check_open()?;
        match &self.failing_prefix {
            Some(prefix) if key.starts_with(prefix.as_str()) => {
                Err(StoreError::Command(format!("injected write failure for {key}")))
            }
            _ => Ok(()),
        }
    }

    fn keys(&self) -> impl Iterator<Item = &String> {
        self.counters
            .keys()
            .chain(self.hashes.keys())
            .chain(self.lists.keys())
            .chain(self.sets.keys())
    }
}

/// In-memory store.
///
/// A single lock guards the whole keyspace, so every trait method, including
/// the multi-step ones, is atomic with respect to concurrent callers.
#[derive(Debug)]
pub struct InMemoryStore {
    keyspace: Mutex<Keyspace>,
    scan_enabled: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            scan_enabled: true,
        }
    }

    /// Create a store that reports no key-scan support.
    pub fn without_scan() -> Self {
        Self {
            scan_enabled: false,
            ..Self::new()
        }
    }

    /// Make every write to a key starting with `prefix` fail.
    pub fn fail_writes_with_prefix(&self, prefix: impl Into<String>) {
        self.keyspace.lock().failing_prefix = Some(prefix.into());
    }

    /// Stop injecting write failures.
    pub fn clear_write_failures(&self) {
        self.keyspace.lock().failing_prefix = None;
    }

    /// Number of keys currently held.
    pub fn num_keys(&self) -> usize {
        self.keyspace.lock().keys().count()
    }

    /// Length of the list at `key` (0 if absent).
    pub fn list_len(&self, key: &str) -> usize {
        self.keyspace.lock().lists.get(key).map_or(0, VecDeque::len)
    }

    /// Whether the handle has been closed.
    pub fn is_closed(&self) -> bool {
        self.keyspace.lock().closed
    }
}

/// Translate a Redis-style glob into an anchored regex.
///
/// Supports `*`, `?`, `[...]` classes (with `^` negation) and `\` escapes.
fn glob_to_regex(pattern: &str) -> Result<Regex, StoreError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                re.push('[');
                for c in chars.by_ref() {
                    match c {
                        ']' => break,
                        '\\' => re.push_str("\\\\"),
                        c => re.push(c),
                    }
                }
                re.push(']');
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    re.push_str(&regex_lite::escape(&escaped.to_string()));
                }
            }
            c => re.push_str(&regex_lite::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| StoreError::Command(format!("bad scan pattern {pattern:?}: {e}")))
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut ks = self.keyspace.lock();
        ks.check_write(key)?;
        let counter = ks.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn hset(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut ks = self.keyspace.lock();
        ks.check_write(key)?;
        let hash = ks.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>, StoreError> {
        let ks = self.keyspace.lock();
        ks.check_open()?;
        Ok(ks.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        let mut ks = self.keyspace.lock();
        ks.check_write(key)?;
        let list = ks.lists.entry(key.to_string()).or_default();
        list.push_back(value.to_string());
        Ok(list.len() as u64)
    }

    async fn append_atomic(&self, lists: &[(&str, &str)], sets: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut ks = self.keyspace.lock();
        // Validate everything first so a failure leaves no partial writes.
        for (key, _) in lists.iter().chain(sets) {
            ks.check_write(key)?;
        }
        for (key, value) in lists {
            ks.lists
                .entry((*key).to_string())
                .or_default()
                .push_back((*value).to_string());
        }
        for (key, member) in sets {
            ks.sets
                .entry((*key).to_string())
                .or_default()
                .insert((*member).to_string());
        }
        Ok(())
    }

    async fn lpush_trim(&self, key: &str, value: &str, capacity: NonZeroUsize) -> Result<(), StoreError> {
        let mut ks = self.keyspace.lock();
        ks.check_write(key)?;
        let list = ks.lists.entry(key.to_string()).or_default();
        list.push_front(value.to_string());
        list.truncate(capacity.get());
        Ok(())
    }

    async fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let ks = self.keyspace.lock();
        ks.check_open()?;
        Ok(ks
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut ks = self.keyspace.lock();
        ks.check_write(key)?;
        ks.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let ks = self.keyspace.lock();
        ks.check_open()?;
        Ok(ks
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        if !self.scan_enabled {
            return Err(StoreError::Command("key scan not supported".to_string()));
        }
        let matcher = glob_to_regex(pattern)?;
        let ks = self.keyspace.lock();
        ks.check_open()?;
        let matched: BTreeSet<&String> = ks.keys().filter(|k| matcher.is_match(k)).collect();
        Ok(matched.into_iter().cloned().collect())
    }

    fn supports_scan(&self) -> bool {
        self.scan_enabled
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.keyspace.lock().closed = true;
        Ok(())
    }
}
