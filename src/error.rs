//! Error types returned by process supervision.
//!
//! - [`StartError`] a process could not be brought up.
//! - [`StopError`] a process could not be brought down.
//! - [`GroupError`] a group membership change was refused.
//!
//! Timeouts are ordinary outcomes here, returned as values and never panics.
//! Every type offers `as_label` for logs/metrics.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by [`ProcessHandle::start`](crate::ProcessHandle::start).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// The executable does not exist.
    #[error("executable not found: {}", path.display())]
    PathMissing {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The init event did not arrive in time.
    #[error("no init event within {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The OS refused to spawn the process.
    #[error("failed to spawn {}: {source}", path.display())]
    Spawn {
        /// Executable path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The process is already running.
    #[error("process already running")]
    AlreadyRunning,

    /// The process was not alive after starting (e.g. it exited before its init event).
    #[error("process not running after start")]
    NotConfirmed,

    /// The status bus was shut down while waiting for the init event.
    #[error("status bus shut down during start")]
    BusClosed,
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use simvisor::StartError;
    ///
    /// assert_eq!(StartError::AlreadyRunning.as_label(), "start_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::PathMissing { .. } => "start_path_missing",
            StartError::Timeout { .. } => "start_timeout",
            StartError::Spawn { .. } => "start_spawn_error",
            StartError::AlreadyRunning => "start_already_running",
            StartError::NotConfirmed => "start_not_confirmed",
            StartError::BusClosed => "start_bus_closed",
        }
    }

    /// True for errors caused by the setup rather than the running process.
    pub fn is_config_error(&self) -> bool {
        matches!(self, StartError::PathMissing { .. })
    }
}

/// # Errors produced by [`ProcessHandle::stop`](crate::ProcessHandle::stop).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StopError {
    /// The process was still alive after interrupt, terminate and kill.
    #[error("process '{name}' did not shut down")]
    ShutdownFailed {
        /// Process name.
        name: String,
    },
}

impl StopError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StopError::ShutdownFailed { .. } => "stop_shutdown_failed",
        }
    }
}

/// # Errors produced by group membership changes.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    /// A member with this name is already registered.
    #[error("process '{0}' already exists")]
    AlreadyExists(String),

    /// No member with this name.
    #[error("process '{0}' not found")]
    NotFound(String),

    /// The member was removed but did not shut down cleanly.
    #[error(transparent)]
    Stop(#[from] StopError),
}

impl GroupError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            GroupError::AlreadyExists(_) => "group_already_exists",
            GroupError::NotFound(_) => "group_not_found",
            GroupError::Stop(e) => e.as_label(),
        }
    }
}
