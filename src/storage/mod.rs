//! Storage Module
//!
//! The keyspace the command engines operate on, and the representation of
//! the values it holds.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              command engines (crate::commands)              │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │ &mut dyn Keyspace
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Db                                │
//! │   HashMap<Bytes, Entry { Value, expires_at }>               │
//! │   lazy expiry on lookup + cleanup_expired() for sweeps      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engines only see the [`Keyspace`] trait. [`Db`] is the in-memory
//! implementation used by the server.

pub mod db;
pub mod expiry;
pub mod value;

use bytes::Bytes;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use db::{Db, DbStats, Entry};
pub use expiry::{ExpiryConfig, SweepSchedule};
pub use value::{check_string_length, Encoding, StringValue, Value, MAX_STRING_LEN};

/// The key-value mapping consumed by the command engines.
///
/// Expiry timestamps are absolute unix milliseconds. A key whose expiry has
/// passed is treated as absent by every lookup.
pub trait Keyspace {
    /// Looks a key up on behalf of a read command.
    fn lookup_read(&mut self, key: &[u8]) -> Option<&mut Value>;

    /// Looks a key up on behalf of a write command.
    fn lookup_write(&mut self, key: &[u8]) -> Option<&mut Value>;

    /// Inserts a key that is known to be absent.
    fn add(&mut self, key: Bytes, value: Value);

    /// Replaces the value of an existing key, keeping its expiry.
    fn overwrite(&mut self, key: &[u8], value: Value);

    /// Adds or replaces a key, dropping any expiry, and signals modification.
    fn set_key(&mut self, key: Bytes, value: Value);

    /// Deletes a key and its expiry. Returns whether it existed.
    fn remove(&mut self, key: &[u8]) -> bool;

    fn set_expiry(&mut self, key: &[u8], at_ms: u64);

    fn expiry(&self, key: &[u8]) -> Option<u64>;

    /// Drops the expiry of a key. Returns whether one was set.
    fn clear_expiry(&mut self, key: &[u8]) -> bool;

    /// Signals that the value under `key` changed.
    fn notify_modified(&mut self, key: &[u8]);

    /// Number of keys, including ones that expired but were not reclaimed yet.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush(&mut self);
}

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
