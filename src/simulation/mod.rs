//! Simulation session control.
//!
//! ## Contents
//! - [`Simulation`] backend and simulation node groups on one bus
//! - [`wait_for_termination`] cross-platform termination signal

mod control;
mod signals;

pub use control::{BACKEND_GROUP, SIM_NODES_GROUP, Simulation};
pub use signals::wait_for_termination;
