//! # Global control-plane configuration.
//!
//! Provides [`Config`] centralized settings for process supervision.
//!
//! Config is used in two ways:
//! 1. **Handle and group creation**: `ProcessHandle::new(spec, bus, config)`
//! 2. **Default timeouts**: callers fall back to [`Config::start_timeout`] /
//!    [`Config::stop_timeout`] when they have no better value.
//!
//! ## Sentinel values
//! - `start_timeout = 0s` → wait indefinitely for the init event
//! - `max_parallel = 0` → unlimited (one worker per group member)

use std::time::Duration;

/// Global configuration for process supervision.
///
/// ## Field semantics
/// - `start_timeout`: Default wait for a process's init event (`0s` = no timeout)
/// - `stop_timeout`: Default wait after the graceful interrupt before escalating
/// - `kill_grace`: Wait after terminate before the final kill
/// - `liveness_checks` / `liveness_interval`: Poll loop confirming a start or a stop
/// - `max_parallel`: Group fan-out cap (`0` = unlimited)
/// - `channel_capacity`: Queue size for transport feeds (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Default time to wait for a process to report initialization.
    pub start_timeout: Duration,

    /// Default time to wait for a graceful exit after the interrupt signal.
    pub stop_timeout: Duration,

    /// Time to wait after the terminate signal before killing.
    pub kill_grace: Duration,

    /// Number of liveness polls after a start or a stop (min 1).
    pub liveness_checks: u32,

    /// Delay between liveness polls.
    pub liveness_interval: Duration,

    /// Maximum number of members started or stopped at once per group.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = at most `n` concurrent start/stop operations
    pub max_parallel: usize,

    /// Capacity of the transport feed queue.
    pub channel_capacity: usize,
}

impl Config {
    /// Returns the default start timeout as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → give up after `d`
    #[inline]
    pub fn default_start_timeout(&self) -> Option<Duration> {
        if self.start_timeout == Duration::ZERO {
            None
        } else {
            Some(self.start_timeout)
        }
    }

    /// Returns the group worker cap for `members` members.
    #[inline]
    pub fn workers_for(&self, members: usize) -> usize {
        match self.max_parallel {
            0 => members.max(1),
            n => n.min(members).max(1),
        }
    }

    /// Returns the liveness poll count clamped to a minimum of 1.
    #[inline]
    pub fn liveness_checks_clamped(&self) -> u32 {
        self.liveness_checks.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `start_timeout = 25s` (backend components need a while to come up)
    /// - `stop_timeout = 3s`
    /// - `kill_grace = 1s`
    /// - `liveness_checks = 3`, `liveness_interval = 1s`
    /// - `max_parallel = 0` (unlimited)
    /// - `channel_capacity = 1024`
    fn default() -> Self {
        Self {
            start_timeout: Duration::from_secs(25),
            stop_timeout: Duration::from_secs(3),
            kill_grace: Duration::from_secs(1),
            liveness_checks: 3,
            liveness_interval: Duration::from_secs(1),
            max_parallel: 0,
            channel_capacity: 1024,
        }
    }
}
