//! Process supervision.
//!
//! ## Contents
//! - [`ProcessSpec`] how to launch a process and confirm it started
//! - [`ProcessHandle`] start/stop state machine for one OS process
//! - [`ProcessGroup`] named set of handles with bounded fan-out
//! - [`start_groups_in_parallel`] all-or-nothing start of several groups

mod group;
mod handle;
mod os;
mod spec;

#[cfg(all(test, unix))]
pub(crate) mod testutil;

pub use group::{GroupReport, ProcessGroup, start_groups_in_parallel, stop_groups_in_parallel};
pub use handle::{ProcessHandle, ProcessPhase, ProcessState};
pub use spec::ProcessSpec;
