//! Active Expiry Schedule
//!
//! Lazy expiry (checking on access) never reclaims a key that is not touched
//! again. The executor therefore runs a periodic sweep over keys that carry a
//! deadline. This module decides how often.
//!
//! ## Adaptive Frequency
//!
//! If many of the sampled keys were already expired, the next sweep comes
//! sooner. If nothing expired, the sweep backs off to save CPU.

use std::time::Duration;
use tracing::{debug, trace};

/// Configuration for the expiry sweep.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// Maximum number of keys with a deadline examined per sweep
    pub keys_per_sweep: usize,

    /// If this fraction of scanned keys are expired, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            keys_per_sweep: 200,
            speedup_threshold: 0.25,
        }
    }
}

/// Tracks the interval until the next sweep.
#[derive(Debug, Clone)]
pub struct SweepSchedule {
    config: ExpiryConfig,
    current: Duration,
}

impl SweepSchedule {
    pub fn new(config: ExpiryConfig) -> Self {
        let current = config.base_interval;
        Self { config, current }
    }

    /// How long to wait before the next sweep.
    pub fn interval(&self) -> Duration {
        self.current
    }

    pub fn keys_per_sweep(&self) -> usize {
        self.config.keys_per_sweep
    }

    /// Feeds the result of a sweep back into the schedule.
    pub fn record(&mut self, scanned: usize, expired: usize) {
        if scanned == 0 || expired == 0 {
            self.current = (self.current * 2).min(self.config.max_interval);
            trace!(
                new_interval_ms = self.current.as_millis(),
                "Nothing expired, slowing down sweeper"
            );
            return;
        }

        let rate = expired as f64 / scanned as f64;
        if rate > self.config.speedup_threshold {
            self.current = (self.current / 2).max(self.config.min_interval);
            debug!(
                expired = expired,
                rate = %format!("{:.2}%", rate * 100.0),
                new_interval_ms = self.current.as_millis(),
                "High expiry rate, speeding up sweeper"
            );
        }
    }
}
