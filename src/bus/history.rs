//! # Session event history.
//!
//! [`EventHistory`] keeps two append-only logs that always grow together:
//! - **complete**: every message of the session, used for history replay in waits;
//! - **pending**: messages since the last [`EventHistory::drain_pending`] call.
//!
//! ## Rules
//! - `append` pushes to both logs under one lock, so a drain never observes a
//!   message in one log but not the other.
//! - Concatenating all drains in call order reproduces the append order exactly.
//! - `reset` empties both logs; call it only between simulation runs.
//! - Every appended message gets a sequence number. Sequence numbers only grow,
//!   across `reset` too, so a [`mark`](EventHistory::mark) taken before an
//!   event fences off everything recorded earlier.

use parking_lot::Mutex;

use crate::status::StatusMessage;

#[derive(Default)]
struct Logs {
    complete: Vec<(u64, StatusMessage)>,
    pending: Vec<StatusMessage>,
    next_seq: u64,
}

/// Append-only, thread-safe log of delivered status messages.
#[derive(Default)]
pub struct EventHistory {
    logs: Mutex<Logs>,
}

impl EventHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivered message in both logs.
    pub fn append(&self, msg: &StatusMessage) {
        let mut logs = self.logs.lock();
        let seq = logs.next_seq;
        logs.next_seq += 1;
        logs.complete.push((seq, msg.clone()));
        logs.pending.push(msg.clone());
    }

    /// Sequence number the next appended message will get.
    pub fn mark(&self) -> u64 {
        self.logs.lock().next_seq
    }

    /// Returns and clears everything appended since the previous drain.
    pub fn drain_pending(&self) -> Vec<StatusMessage> {
        std::mem::take(&mut self.logs.lock().pending)
    }

    /// Finds the oldest message compatible with any of `matchers`.
    pub fn find(&self, matchers: &[StatusMessage]) -> Option<StatusMessage> {
        self.find_since(matchers, 0)
    }

    /// Finds the oldest message recorded at or after `mark` that is
    /// compatible with any of `matchers`.
    pub fn find_since(&self, matchers: &[StatusMessage], mark: u64) -> Option<StatusMessage> {
        let logs = self.logs.lock();
        if mark >= logs.next_seq {
            return None;
        }
        logs.complete
            .iter()
            .find(|(seq, msg)| *seq >= mark && msg.matches_any(matchers))
            .map(|(_, msg)| msg.clone())
    }

    /// True if any recorded message is compatible with any of `matchers`.
    pub fn contains(&self, matchers: &[StatusMessage]) -> bool {
        self.find(matchers).is_some()
    }

    /// Copy of the complete log, oldest first.
    pub fn snapshot(&self) -> Vec<StatusMessage> {
        self.logs
            .lock()
            .complete
            .iter()
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Number of messages in the complete log.
    pub fn len(&self) -> usize {
        self.logs.lock().complete.len()
    }

    /// True if nothing was recorded since creation or the last reset.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties both logs.
    pub fn reset(&self) {
        let mut logs = self.logs.lock();
        logs.complete.clear();
        logs.pending.clear();
    }
}
