//! # Global runtime configuration.
//!
//! Provides [`Config`] — centralized settings for the supervision runtime.
//!
//! ## Field semantics
//! - `wait`: debounce window applied by the supervisor to watcher changes
//! - `poll_interval`: polling cadence of the built-in [`PollWatcher`](crate::PollWatcher)
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by the Bus)

use std::time::Duration;

/// Global configuration for the supervision runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// Debounce window for watcher changes.
    ///
    /// After a change, the supervisor waits this long for the burst to
    /// settle before reading and reparsing the configuration file.
    pub wait: Duration,

    /// Polling cadence for the built-in metadata-polling watcher.
    pub poll_interval: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages
    /// will skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `wait = 1s` (collapses editor save bursts)
    /// - `poll_interval = 100ms`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            bus_capacity: 1024,
        }
    }
}
