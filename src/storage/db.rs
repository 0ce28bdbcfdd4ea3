//! In-Memory Keyspace with Expiry Support
//!
//! [`Db`] is the keyspace the server runs on. It is owned by the executor
//! task, so it needs no locking: exactly one command touches it at a time.
//!
//! ## Expiry
//!
//! Keys with a TTL are reclaimed in two ways:
//! 1. **Lazy**: every lookup checks the key's deadline and drops it if passed
//! 2. **Active**: [`Db::cleanup_expired`] scans a bounded number of keys with
//!    a deadline; the executor calls it on the sweep schedule
//!
//! ## Modification Signals
//!
//! `notify_modified` stamps the key's entry with a fresh value of a Db-wide
//! modification counter. Anything that needs to detect a change between two
//! points in time (optimistic transactions, tests) compares
//! [`Db::key_version`] snapshots. The stamp lives and dies with the entry, and
//! an absent key reads as version 0.

use crate::storage::value::Value;
use crate::storage::{now_ms, Keyspace};
use bytes::Bytes;
use std::collections::HashMap;

/// A stored value with its optional deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: Value,
    /// Absolute expiry in unix milliseconds (None = never expires)
    pub expires_at: Option<u64>,
    /// Modification stamp of the last `notify_modified`, 0 if never notified
    pub version: u64,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
            version: 0,
        }
    }

    #[inline]
    pub fn is_expired_at(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Keyspace statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DbStats {
    /// Number of keys currently stored
    pub keys: usize,
    /// Keys carrying an expiry
    pub expires: usize,
    /// Read lookups that found a key
    pub hits: u64,
    /// Read lookups that found nothing
    pub misses: u64,
    /// Keys reclaimed because their deadline passed
    pub expired: u64,
}

/// The in-memory keyspace.
#[derive(Debug, Default)]
pub struct Db {
    entries: HashMap<Bytes, Entry>,
    modifications: u64,
    hits: u64,
    misses: u64,
    expired: u64,
}

impl Db {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `key` if its deadline has passed. Returns true if it was dropped.
    fn expire_if_needed(&mut self, key: &[u8]) -> bool {
        let now = now_ms();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_expired_at(now));
        if expired {
            self.entries.remove(key);
            self.expired += 1;
        }
        expired
    }

    /// Removes expired keys, examining at most `budget` keys that carry a
    /// deadline.
    ///
    /// # Returns
    ///
    /// `(scanned, removed)`
    pub fn cleanup_expired(&mut self, budget: usize) -> (usize, usize) {
        let now = now_ms();
        let mut scanned = 0;
        let mut doomed = Vec::new();

        for (key, entry) in self.entries.iter() {
            if scanned >= budget {
                break;
            }
            if entry.expires_at.is_none() {
                continue;
            }
            scanned += 1;
            if entry.is_expired_at(now) {
                doomed.push(key.clone());
            }
        }

        for key in &doomed {
            self.entries.remove(key);
        }
        self.expired += doomed.len() as u64;

        (scanned, doomed.len())
    }

    /// Version counter of a key, bumped by every modification signal.
    pub fn key_version(&self, key: &[u8]) -> u64 {
        self.entries.get(key).map_or(0, |entry| entry.version)
    }

    pub fn stats(&self) -> DbStats {
        DbStats {
            keys: self.entries.len(),
            expires: self
                .entries
                .values()
                .filter(|e| e.expires_at.is_some())
                .count(),
            hits: self.hits,
            misses: self.misses,
            expired: self.expired,
        }
    }
}

impl Keyspace for Db {
    fn lookup_read(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.expire_if_needed(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.hits += 1;
                Some(&mut entry.value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn lookup_write(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.expire_if_needed(key);
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    fn add(&mut self, key: Bytes, value: Value) {
        debug_assert!(!self.entries.contains_key(&key), "add on existing key");
        self.entries.insert(key, Entry::new(value));
    }

    fn overwrite(&mut self, key: &[u8], value: Value) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
        }
    }

    fn set_key(&mut self, key: Bytes, value: Value) {
        let signalled = key.clone();
        self.entries.insert(key, Entry::new(value));
        self.notify_modified(&signalled);
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        self.expire_if_needed(key);
        self.entries.remove(key).is_some()
    }

    fn set_expiry(&mut self, key: &[u8], at_ms: u64) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.expires_at = Some(at_ms);
        }
    }

    fn expiry(&self, key: &[u8]) -> Option<u64> {
        self.entries.get(key).and_then(|entry| entry.expires_at)
    }

    fn clear_expiry(&mut self, key: &[u8]) -> bool {
        self.entries
            .get_mut(key)
            .and_then(|entry| entry.expires_at.take())
            .is_some()
    }

    fn notify_modified(&mut self, key: &[u8]) {
        if let Some(entry) = self.entries.get_mut(key) {
            self.modifications += 1;
            entry.version = self.modifications;
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn flush(&mut self) {
        self.entries.clear();
    }
}
