//! Server Configuration
//!
//! Parsed from the command line with clap. Every option has a default, so the
//! server starts with no arguments at all.

use crate::commands::handler::DEFAULT_FEED_CAPACITY;
use crate::executor::DEFAULT_QUEUE_DEPTH;
use crate::storage::ExpiryConfig;
use clap::Parser;
use std::time::Duration;

/// strandkv server
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "strandkv")]
#[command(about = "In-memory key-value server speaking the Redis protocol")]
#[command(version)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = crate::DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT)]
    pub port: u16,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Base interval of the active expiry sweep, in milliseconds
    #[arg(long, default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Commands that may queue for the executor before clients wait
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,

    /// Propagated commands buffered per feed subscriber
    #[arg(long, default_value_t = DEFAULT_FEED_CAPACITY)]
    pub feed_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_HOST.to_string(),
            port: crate::DEFAULT_PORT,
            log_level: "info".to_string(),
            sweep_interval_ms: 100,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Expiry sweep settings derived from `sweep_interval_ms`.
    ///
    /// The sweep may run up to ten times faster or slower than the base
    /// interval as the expiry rate changes.
    pub fn expiry_config(&self) -> ExpiryConfig {
        let base = Duration::from_millis(self.sweep_interval_ms.max(1));
        ExpiryConfig {
            base_interval: base,
            min_interval: (base / 10).max(Duration::from_millis(1)),
            max_interval: base * 10,
            ..ExpiryConfig::default()
        }
    }
}
