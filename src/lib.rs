//! # simvisor
//!
//! **Simvisor** is the control-plane core of a simulation backend client.
//!
//! It receives status events from backend processes, lets callers listen for
//! them or wait on them, and supervises the external processes that publish
//! them: start with an init handshake, graceful stop with escalation, and
//! group-wide parallel start/stop.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   transport (JSON records)
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │  StatusFeed  │  single ordered ingestion path
//!   └──────┬───────┘
//!          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StatusBus::ingest(msg)                                           │
//! │    1. EventHistory.append     (complete log + pending-read log)   │
//! │    2. ListenerRegistry.dispatch  (snapshot, every match, in order)│
//! │    3. WaitRegistry.deliver       (first matching ticket wakes)    │
//! └──────────────────────────────────┬────────────────────────────────┘
//!                                    │ init events
//!                                    ▼
//!   ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//!   │  ProcessHandle   │   │  ProcessHandle   │   │  ProcessHandle   │
//!   │ start ─► wait    │   │ start ─► wait    │   │ start ─► wait    │
//!   └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!            └──────────────┬───────┴──────────────────────┘
//!                           ▼
//!                 ProcessGroup (bounded fan-out, per-member report)
//!                           ▼
//!                 Simulation (backend + sim_nodes, shutdown)
//! ```
//!
//! ### Start of one process
//! ```text
//! start(timeout)
//!   ├─► executable exists?            no ─► StartError::PathMissing
//!   ├─► bus.prepare_wait(init matcher, history replay)
//!   ├─► spawn                         err ─► StartError::Spawn
//!   ├─► select { init event, child exit }
//!   │       ├─ TimedOut  ─► kill ─► StartError::Timeout
//!   │       ├─ Cancelled ─► kill ─► StartError::BusClosed
//!   │       └─ exited    ─► StartError::NotConfirmed
//!   └─► liveness poll ─► Running
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                  |
//! |-------------------|----------------------------------------------------------|--------------------------------------------|
//! | **Status model**  | Events, wildcard matching, severity, code catalogue.     | [`StatusMessage`], [`Origin`], [`StatusCode`] |
//! | **Bus**           | Ingest, listen, wait with timeout, history, shutdown.    | [`StatusBus`], [`WaitOutcome`]             |
//! | **Processes**     | Start/stop state machine, groups with parallel fan-out.  | [`ProcessHandle`], [`ProcessGroup`]        |
//! | **Simulation**    | Backend plus simulation nodes as one session.            | [`Simulation`]                             |
//! | **Transport**     | JSON wire records fed into the bus in order.             | [`StatusFeed`], [`StatusSource`]           |
//! | **Errors**        | Typed start/stop/membership failures.                    | [`StartError`], [`StopError`], [`GroupError`] |
//! | **Configuration** | Timeouts, liveness polling, fan-out cap.                 | [`Config`]                                 |
//!
//! ## Example
//! ```rust,no_run
//! use simvisor::{Config, Origin, ProcessSpec, Simulation, StatusBus, StatusCode, StatusLogger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     tracing_subscriber::fmt()
//!         .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
//!         .init();
//!
//!     let bus = StatusBus::new();
//!     StatusLogger::new().attach(&bus);
//!
//!     let sim = Simulation::new(bus.clone(), "/opt/backend", Config::default());
//!     // Feed JSON status records from the backend connection into the bus.
//!     let (tx, feed) = sim.open_feed();
//!
//!     sim.add_sim_node(
//!         ProcessSpec::new("radar", Origin::SimNode, "/opt/nodes", "radar_node")
//!             .with_init_code(StatusCode::CompInitFinished),
//!     )?;
//!
//!     if sim.start().await {
//!         sim.run_until_signal().await?;
//!     }
//!     drop(tx);
//!     feed.join().await;
//!     Ok(())
//! }
//! ```

mod bus;
mod config;
mod error;
mod process;
mod simulation;
mod status;
pub mod transport;

// ---- Public re-exports ----

pub use bus::{
    Callback, EventHistory, ListenerId, ListenerRegistry, PendingWait, StatusBus, StatusLogger,
    TicketId, WaitOutcome, WaitRegistry,
};
pub use config::Config;
pub use error::{GroupError, StartError, StopError};
pub use process::{
    GroupReport, ProcessGroup, ProcessHandle, ProcessPhase, ProcessSpec, ProcessState,
    start_groups_in_parallel, stop_groups_in_parallel,
};
pub use simulation::{BACKEND_GROUP, SIM_NODES_GROUP, Simulation, wait_for_termination};
pub use status::{
    MAX_APP_CODE, Origin, Severity, StatusCode, StatusMessage, bus_code, format_code, normalize,
    split_bus_code,
};
pub use transport::{FeedStats, StatusFeed, StatusSource, WireError};
