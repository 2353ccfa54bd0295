//! Status event bus: history, listeners, waits.
//!
//! ## Contents
//! - [`StatusBus`] single ingestion point; composes the three registries below
//! - [`EventHistory`] session log with drain-since-last-read support
//! - [`ListenerRegistry`] matcher → callbacks, snapshot dispatch
//! - [`WaitRegistry`] pending waits, first-match delivery, cancellation
//! - [`StatusLogger`] listener that logs every message via `tracing`
//!
//! ## Quick reference
//! - **Producers**: the transport adapter ([`StatusFeed`](crate::StatusFeed)) or
//!   any caller of [`StatusBus::ingest`].
//! - **Consumers**: [`ProcessHandle`](crate::ProcessHandle) init waits, user
//!   listeners, and callers of [`StatusBus::wait_for_any`].

mod history;
mod listeners;
mod log;
mod status_bus;
mod waits;

pub use history::EventHistory;
pub use listeners::{Callback, ListenerId, ListenerRegistry};
pub use log::StatusLogger;
pub use status_bus::StatusBus;
pub use waits::{PendingWait, TicketId, WaitOutcome, WaitRegistry};
