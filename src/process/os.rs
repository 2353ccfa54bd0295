//! # OS process primitives.
//!
//! Thin helpers over [`tokio::process::Child`] used by the handle's state
//! machine: liveness checks and the graceful → terminate → kill ladder.
//!
//! **Unix platforms:** interrupt is `SIGINT`, terminate is `SIGTERM`, kill is `SIGKILL`.
//!
//! **Other platforms:** there is no portable interrupt; every step falls back
//! to a forced kill.

use std::io;
use std::time::Duration;

use tokio::process::Child;

/// Signals sent while stopping a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StopSignal {
    /// Ask the process to shut down gracefully.
    Interrupt,
    /// Demand termination.
    Terminate,
}

/// True if the process has not exited yet.
///
/// An error from the OS is treated as "not running".
pub(crate) fn is_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}

/// Sends `signal` to the process.
#[cfg(unix)]
pub(crate) fn send(child: &mut Child, signal: StopSignal) -> io::Result<()> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let sig = match signal {
        StopSignal::Interrupt => Signal::SIGINT,
        StopSignal::Terminate => Signal::SIGTERM,
    };
    kill(Pid::from_raw(pid), sig).map_err(io::Error::from)
}

/// Sends `signal` to the process.
#[cfg(not(unix))]
pub(crate) fn send(child: &mut Child, _signal: StopSignal) -> io::Result<()> {
    child.start_kill()
}

/// Waits up to `limit` for the process to exit. Returns true if it exited.
pub(crate) async fn wait_exit(child: &mut Child, limit: Duration) -> bool {
    matches!(tokio::time::timeout(limit, child.wait()).await, Ok(Ok(_)))
}

/// Watches the process for `checks` polls, `interval` apart.
///
/// Returns false as soon as the process is seen exited; true only if it is
/// still alive after the last poll.
pub(crate) async fn confirm_alive(child: &mut Child, checks: u32, interval: Duration) -> bool {
    for _ in 0..checks {
        tokio::time::sleep(interval).await;
        if !is_alive(child) {
            return false;
        }
    }
    true
}

/// Polls liveness up to `checks` times, `interval` apart.
///
/// Returns true as soon as the process is seen exited.
pub(crate) async fn confirm_exited(child: &mut Child, checks: u32, interval: Duration) -> bool {
    for attempt in 0..checks {
        if !is_alive(child) {
            return true;
        }
        if attempt + 1 < checks {
            tokio::time::sleep(interval).await;
        }
    }
    false
}
