//! # ProcessHandle: supervise one external process.
//!
//! ## State machine
//! ```text
//!            start()                      init event / alive
//! NotRunning ───────► Starting ─────────────────────────────► Running
//!     ▲                  │ path missing, spawn error,             │
//!     │                  │ init timeout, exited before init       │ stop()
//!     └──────────────────┘ (child force-killed)                   ▼
//!     ▲                                                        Stopping
//!     └───────────── SIGINT ─► SIGTERM ─► SIGKILL ◄───────────────┘
//! ```
//!
//! ## Start sequence
//! 1. Refuse if the OS process is still alive.
//! 2. Check that the executable exists (no I/O beyond a stat, no blocking).
//! 3. Register the init wait on the bus **before** spawning. History is
//!    replayed, but only from this handle's fence onwards.
//! 4. Spawn with the working directory set to `exec_dir`.
//! 5. Race the init wait against the child exiting.
//! 6. Confirm liveness: the process must stay alive for the whole poll window.
//!
//! ## Rules
//! - Start, stop and state queries are serialized by one lock owning the OS
//!   handle. `state()` therefore waits while a start or stop is in progress.
//! - [`ProcessHandle::phase`] is a lock-free cached view that also reports the
//!   transient `Starting` / `Stopping` windows.
//! - [`ProcessHandle::state`] always re-derives Running/NotRunning from the OS.
//! - Dropping a handle kills a still-running child.
//! - Every stop and every failed start moves the history fence to the bus's
//!   current mark, so a restart never accepts the previous run's init event.
//!   Other processes' history is left untouched.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::os::{self, StopSignal};
use super::spec::ProcessSpec;
use crate::bus::{ListenerId, PendingWait, StatusBus, WaitOutcome};
use crate::config::Config;
use crate::error::{StartError, StopError};
use crate::status::StatusMessage;

/// Observed OS state of a supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No OS process, or it has exited.
    NotRunning,
    /// The OS process is alive.
    Running,
}

/// Cached lifecycle phase, including transient windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessPhase {
    /// Idle.
    NotRunning = 0,
    /// `start` in progress.
    Starting = 1,
    /// Last start succeeded.
    Running = 2,
    /// `stop` in progress.
    Stopping = 3,
}

impl ProcessPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ProcessPhase::Starting,
            2 => ProcessPhase::Running,
            3 => ProcessPhase::Stopping,
            _ => ProcessPhase::NotRunning,
        }
    }
}

/// Supervises one external OS process.
pub struct ProcessHandle {
    spec: ProcessSpec,
    bus: StatusBus,
    cfg: Config,
    phase: AtomicU8,
    history_fence: AtomicU64,
    child: Mutex<Option<Child>>,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("name", &self.spec.name())
            .field("phase", &self.phase())
            .finish()
    }
}

impl ProcessHandle {
    /// Creates a handle; nothing is started.
    pub fn new(spec: ProcessSpec, bus: StatusBus, cfg: Config) -> Self {
        Self {
            spec,
            bus,
            cfg,
            phase: AtomicU8::new(ProcessPhase::NotRunning as u8),
            history_fence: AtomicU64::new(0),
            child: Mutex::new(None),
        }
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Launch specification.
    pub fn spec(&self) -> &ProcessSpec {
        &self.spec
    }

    /// Cached lifecycle phase (does not touch the OS).
    pub fn phase(&self) -> ProcessPhase {
        ProcessPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: ProcessPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Events ingested before this point can no longer confirm a start.
    fn fence_history(&self) {
        self.history_fence
            .store(self.bus.history_mark(), Ordering::Release);
    }

    /// Running/NotRunning as reported by the OS right now.
    pub async fn state(&self) -> ProcessState {
        let mut slot = self.child.lock().await;
        match slot.as_mut() {
            Some(child) => {
                if os::is_alive(child) {
                    ProcessState::Running
                } else {
                    ProcessState::NotRunning
                }
            }
            None => ProcessState::NotRunning,
        }
    }

    /// True if the OS process is alive.
    pub async fn is_running(&self) -> bool {
        self.state().await == ProcessState::Running
    }

    /// OS process id while the handle owns a process.
    pub async fn pid(&self) -> Option<u32> {
        self.child.lock().await.as_ref().and_then(Child::id)
    }

    /// Starts the process and waits until it is confirmed up.
    ///
    /// `timeout` bounds the wait for the init event (`None` = wait
    /// indefinitely); it is ignored for specs without an init code.
    ///
    /// On any failure after spawning, the child is killed before returning.
    pub async fn start(&self, timeout: Option<Duration>) -> Result<(), StartError> {
        let mut slot = self.child.lock().await;
        if let Some(child) = slot.as_mut() {
            if os::is_alive(child) {
                tracing::error!(process = self.name(), "start refused: process still running");
                return Err(StartError::AlreadyRunning);
            }
            self.fence_history();
        }
        *slot = None;

        let path = self.spec.exec_path();
        if !path.exists() {
            tracing::error!(process = self.name(), path = %path.display(), "executable not found");
            return Err(StartError::PathMissing { path });
        }

        self.set_phase(ProcessPhase::Starting);
        let init = self
            .spec
            .init_matcher()
            .map(|m| {
                let fence = self.history_fence.load(Ordering::Acquire);
                self.bus.prepare_wait_since(vec![m], fence)
            });

        let mut child = match self.spawn() {
            Ok(child) => child,
            Err(source) => {
                self.set_phase(ProcessPhase::NotRunning);
                tracing::error!(process = self.name(), error = %source, "spawn failed");
                return Err(StartError::Spawn { path, source });
            }
        };
        tracing::info!(process = self.name(), pid = child.id(), "process spawned");

        match self.confirm_start(&mut child, init, timeout).await {
            Ok(()) => {
                *slot = Some(child);
                self.set_phase(ProcessPhase::Running);
                tracing::info!(process = self.name(), "process started");
                Ok(())
            }
            Err(err) => {
                tracing::error!(process = self.name(), error = %err, label = err.as_label(), "start failed");
                if let Err(kill_err) = child.kill().await {
                    tracing::warn!(process = self.name(), error = %kill_err, "failed to kill partially started process");
                }
                self.fence_history();
                self.set_phase(ProcessPhase::NotRunning);
                Err(err)
            }
        }
    }

    fn spawn(&self) -> std::io::Result<Child> {
        let mut cmd = Command::new(self.spec.exec_path());
        cmd.args(self.spec.args())
            .envs(self.spec.env().iter().map(|(k, v)| (k, v)))
            .current_dir(self.spec.exec_dir())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd.spawn()
    }

    async fn confirm_start(
        &self,
        child: &mut Child,
        init: Option<PendingWait>,
        timeout: Option<Duration>,
    ) -> Result<(), StartError> {
        if let Some(init) = init {
            tokio::select! {
                outcome = init.wait(timeout) => match outcome {
                    WaitOutcome::Matched(msg) => {
                        tracing::debug!(process = self.name(), %msg, "init event received");
                    }
                    WaitOutcome::TimedOut => {
                        return Err(StartError::Timeout { timeout: timeout.unwrap_or_default() });
                    }
                    WaitOutcome::Cancelled => return Err(StartError::BusClosed),
                },
                status = child.wait() => {
                    tracing::warn!(process = self.name(), ?status, "process exited before init event");
                    return Err(StartError::NotConfirmed);
                }
            }
        }

        let alive = os::confirm_alive(
            child,
            self.cfg.liveness_checks_clamped(),
            self.cfg.liveness_interval,
        )
        .await;
        if alive {
            Ok(())
        } else {
            Err(StartError::NotConfirmed)
        }
    }

    /// Stops the process: interrupt, then terminate, then kill.
    ///
    /// `timeout` bounds the graceful phase. The OS handle is released on
    /// return whatever the outcome.
    pub async fn stop(&self, timeout: Duration) -> Result<(), StopError> {
        let mut slot = self.child.lock().await;
        self.fence_history();
        let Some(mut child) = slot.take() else {
            tracing::debug!(process = self.name(), "stop: process already terminated");
            self.set_phase(ProcessPhase::NotRunning);
            return Ok(());
        };
        if !os::is_alive(&mut child) {
            self.set_phase(ProcessPhase::NotRunning);
            return Ok(());
        }

        self.set_phase(ProcessPhase::Stopping);
        let exited = self.escalate(&mut child, timeout).await;
        self.set_phase(ProcessPhase::NotRunning);

        if exited {
            tracing::info!(process = self.name(), "process stopped");
            Ok(())
        } else {
            tracing::error!(process = self.name(), "shutdown failed");
            Err(StopError::ShutdownFailed {
                name: self.name().to_owned(),
            })
        }
    }

    async fn escalate(&self, child: &mut Child, timeout: Duration) -> bool {
        if let Err(err) = os::send(child, StopSignal::Interrupt) {
            tracing::debug!(process = self.name(), error = %err, "interrupt not delivered");
        }
        if os::wait_exit(child, timeout).await {
            return true;
        }

        tracing::info!(process = self.name(), "graceful shutdown timed out, terminating");
        if let Err(err) = os::send(child, StopSignal::Terminate) {
            tracing::debug!(process = self.name(), error = %err, "terminate not delivered");
        }
        if os::wait_exit(child, self.cfg.kill_grace).await {
            return true;
        }

        tracing::warn!(process = self.name(), "terminate ignored, killing");
        if let Err(err) = child.start_kill() {
            tracing::debug!(process = self.name(), error = %err, "kill not delivered");
        }
        os::confirm_exited(
            child,
            self.cfg.liveness_checks_clamped(),
            self.cfg.liveness_interval,
        )
        .await
    }

    /// Stops, then starts again; reports the start result.
    pub async fn restart(
        &self,
        start_timeout: Option<Duration>,
        stop_timeout: Duration,
    ) -> Result<(), StartError> {
        if let Err(err) = self.stop(stop_timeout).await {
            tracing::warn!(process = self.name(), error = %err, "restart: stop failed, starting anyway");
        }
        self.start(start_timeout).await
    }

    /// Listens to this process's status events.
    ///
    /// `code` is an application code (without the origin prefix); `None`
    /// listens to every event of this process.
    pub fn add_listener<F>(&self, code: Option<u32>, callback: F) -> ListenerId
    where
        F: Fn(&StatusMessage) + Send + Sync + 'static,
    {
        self.bus.add_listener(self.spec.matcher(code), callback)
    }

    /// Removes every listener added with [`add_listener`](Self::add_listener) for `code`.
    pub fn remove_listeners(&self, code: Option<u32>) -> usize {
        self.bus.remove_listeners(&self.spec.matcher(code))
    }

    /// Removes one listener by id.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.bus.remove_listener(id)
    }
}
