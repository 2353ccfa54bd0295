//! # Pending waits keyed by ticket.
//!
//! A caller waiting for "any of these matchers" registers a ticket holding the
//! matchers and the sending half of a `oneshot` channel. The ingesting thread
//! delivers to the **first** live ticket (registration order) whose matchers
//! accept the message; the ticket leaves the live set in the same critical
//! section, so it can never be satisfied twice.
//!
//! ## Lifecycle
//! ```text
//! register(matchers) ──► (TicketId, Receiver) ──► PendingWait::wait(timeout)
//!                                                   ├─ Ok(msg)     → Matched
//!                                                   ├─ sender gone → Cancelled (shutdown)
//!                                                   └─ elapsed     → ticket removed → TimedOut
//! ```
//! Dropping a [`PendingWait`] removes its ticket, so an abandoned wait never
//! swallows a message meant for another waiter.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::status::StatusMessage;

/// Identifies one pending wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketId(u64);

/// Result of a wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A compatible message arrived (or was found in history).
    Matched(StatusMessage),
    /// The timeout elapsed first.
    TimedOut,
    /// The bus was shut down while waiting.
    Cancelled,
}

impl WaitOutcome {
    /// True for [`WaitOutcome::Matched`].
    #[inline]
    pub fn is_matched(&self) -> bool {
        matches!(self, WaitOutcome::Matched(_))
    }

    /// The matched message, if any.
    pub fn message(&self) -> Option<&StatusMessage> {
        match self {
            WaitOutcome::Matched(msg) => Some(msg),
            _ => None,
        }
    }

    /// `(ok, message)` pair; `(false, None)` on timeout or cancellation.
    pub fn into_parts(self) -> (bool, Option<StatusMessage>) {
        match self {
            WaitOutcome::Matched(msg) => (true, Some(msg)),
            _ => (false, None),
        }
    }

    /// Short stable label (for logs).
    pub fn as_label(&self) -> &'static str {
        match self {
            WaitOutcome::Matched(_) => "matched",
            WaitOutcome::TimedOut => "timed_out",
            WaitOutcome::Cancelled => "cancelled",
        }
    }
}

struct Ticket {
    id: TicketId,
    matchers: Vec<StatusMessage>,
    tx: oneshot::Sender<StatusMessage>,
}

#[derive(Default)]
struct Live {
    tickets: Vec<Ticket>,
    closed: bool,
}

/// Thread-safe set of pending waits.
#[derive(Default)]
pub struct WaitRegistry {
    next_id: AtomicU64,
    live: Mutex<Live>,
}

impl WaitRegistry {
    /// Creates an empty, open registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a ticket visible to every later [`deliver`](Self::deliver).
    ///
    /// Returns `None` once the registry was closed by [`cancel_all`](Self::cancel_all).
    ///
    /// # Panics
    /// Panics if `matchers` is empty; a wait without matchers is a caller bug.
    pub fn register(
        &self,
        matchers: Vec<StatusMessage>,
    ) -> Option<(TicketId, oneshot::Receiver<StatusMessage>)> {
        assert!(!matchers.is_empty(), "a wait needs at least one matcher");

        let mut live = self.live.lock();
        if live.closed {
            return None;
        }
        let id = TicketId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        live.tickets.push(Ticket { id, matchers, tx });
        Some((id, rx))
    }

    /// Hands `msg` to the first live ticket that accepts it.
    ///
    /// Tickets whose receiver is already gone are skipped and discarded.
    /// Returns true if a ticket was satisfied.
    pub fn deliver(&self, msg: &StatusMessage) -> bool {
        let mut live = self.live.lock();
        live.tickets.retain(|t| !t.tx.is_closed());

        while let Some(pos) = live.tickets.iter().position(|t| msg.matches_any(&t.matchers)) {
            let ticket = live.tickets.remove(pos);
            if ticket.tx.send(msg.clone()).is_ok() {
                return true;
            }
        }
        false
    }

    /// Removes one ticket. Returns false if it was already satisfied or removed.
    pub fn cancel(&self, id: TicketId) -> bool {
        let mut live = self.live.lock();
        let before = live.tickets.len();
        live.tickets.retain(|t| t.id != id);
        live.tickets.len() != before
    }

    /// Closes the registry and wakes every live ticket with a cancelled result.
    ///
    /// Idempotent. Returns the number of tickets woken.
    pub fn cancel_all(&self) -> usize {
        let drained = {
            let mut live = self.live.lock();
            live.closed = true;
            std::mem::take(&mut live.tickets)
        };
        // Dropping the senders wakes the receivers.
        drained.len()
    }

    /// Number of live tickets.
    pub fn len(&self) -> usize {
        self.live.lock().tickets.len()
    }

    /// True if no ticket is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`cancel_all`](Self::cancel_all) ran.
    pub fn is_closed(&self) -> bool {
        self.live.lock().closed
    }
}

/// Removes its ticket from the registry when dropped.
struct TicketGuard {
    id: TicketId,
    registry: Arc<WaitRegistry>,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        self.registry.cancel(self.id);
    }
}

/// A wait that has been set up but not awaited yet.
///
/// Created by [`StatusBus::prepare_wait`](crate::StatusBus::prepare_wait). The
/// ticket is live from creation, so events ingested between preparation and
/// [`wait`](Self::wait) are not lost.
pub struct PendingWait {
    state: PendingState,
}

enum PendingState {
    Ready(StatusMessage),
    Closed,
    Waiting {
        rx: oneshot::Receiver<StatusMessage>,
        guard: TicketGuard,
    },
}

impl PendingWait {
    pub(crate) fn ready(msg: StatusMessage) -> Self {
        Self {
            state: PendingState::Ready(msg),
        }
    }

    pub(crate) fn closed() -> Self {
        Self {
            state: PendingState::Closed,
        }
    }

    pub(crate) fn waiting(
        registry: Arc<WaitRegistry>,
        id: TicketId,
        rx: oneshot::Receiver<StatusMessage>,
    ) -> Self {
        Self {
            state: PendingState::Waiting {
                rx,
                guard: TicketGuard { id, registry },
            },
        }
    }

    /// Ticket id, if the wait is backed by a live ticket.
    pub fn ticket(&self) -> Option<TicketId> {
        match &self.state {
            PendingState::Waiting { guard, .. } => Some(guard.id),
            _ => None,
        }
    }

    /// Waits until matched, cancelled, or `timeout` elapses (`None` = no timeout).
    pub async fn wait(self, timeout: Option<Duration>) -> WaitOutcome {
        let (mut rx, guard) = match self.state {
            PendingState::Ready(msg) => return WaitOutcome::Matched(msg),
            PendingState::Closed => return WaitOutcome::Cancelled,
            PendingState::Waiting { rx, guard } => (rx, guard),
        };

        let received = match timeout {
            Some(dur) => match tokio::time::timeout(dur, &mut rx).await {
                Ok(received) => received,
                Err(_elapsed) => {
                    // Delivery may have won the race right at the deadline.
                    guard.registry.cancel(guard.id);
                    return match rx.try_recv() {
                        Ok(msg) => WaitOutcome::Matched(msg),
                        Err(_) => WaitOutcome::TimedOut,
                    };
                }
            },
            None => (&mut rx).await,
        };

        match received {
            Ok(msg) => WaitOutcome::Matched(msg),
            Err(_closed) => WaitOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: u32) -> StatusMessage {
        StatusMessage::any().with_code(c)
    }

    #[test]
    fn delivers_to_first_matching_ticket_only() {
        let reg = WaitRegistry::new();
        let (_, mut rx_other) = reg.register(vec![code(1)]).expect("open");
        let (_, mut rx_first) = reg.register(vec![code(2), code(3)]).expect("open");
        let (_, mut rx_second) = reg.register(vec![code(3)]).expect("open");

        assert!(reg.deliver(&code(3)));
        assert_eq!(rx_first.try_recv().ok(), Some(code(3)));
        assert!(rx_second.try_recv().is_err());
        assert!(rx_other.try_recv().is_err());
        assert_eq!(reg.len(), 2);

        assert!(reg.deliver(&code(3)));
        assert_eq!(rx_second.try_recv().ok(), Some(code(3)));
        assert!(!reg.deliver(&code(3)));
    }

    #[test]
    fn skips_tickets_whose_waiter_is_gone() {
        let reg = WaitRegistry::new();
        let (_, rx_dropped) = reg.register(vec![code(1)]).expect("open");
        let (_, mut rx_alive) = reg.register(vec![code(1)]).expect("open");
        drop(rx_dropped);

        assert!(reg.deliver(&code(1)));
        assert_eq!(rx_alive.try_recv().ok(), Some(code(1)));
    }

    #[test]
    fn cancel_all_closes_registry() {
        let reg = WaitRegistry::new();
        let (_, mut rx) = reg.register(vec![code(1)]).expect("open");

        assert_eq!(reg.cancel_all(), 1);
        assert!(matches!(rx.try_recv(), Err(oneshot::error::TryRecvError::Closed)));
        assert!(reg.register(vec![code(1)]).is_none());
        assert_eq!(reg.cancel_all(), 0);
    }

    #[test]
    #[should_panic(expected = "at least one matcher")]
    fn empty_matcher_list_is_a_caller_bug() {
        let _ = WaitRegistry::new().register(Vec::new());
    }

    #[tokio::test]
    async fn timed_out_wait_removes_its_ticket() {
        let reg = Arc::new(WaitRegistry::new());
        let (id, rx) = reg.register(vec![code(1)]).expect("open");
        let pending = PendingWait::waiting(Arc::clone(&reg), id, rx);

        let outcome = pending.wait(Some(Duration::from_millis(20))).await;
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(reg.is_empty());
        assert!(!reg.deliver(&code(1)));
    }

    #[tokio::test]
    async fn dropped_wait_removes_its_ticket() {
        let reg = Arc::new(WaitRegistry::new());
        let (id, rx) = reg.register(vec![code(1)]).expect("open");
        drop(PendingWait::waiting(Arc::clone(&reg), id, rx));
        assert!(reg.is_empty());
    }

    #[test]
    fn outcome_parts() {
        assert_eq!(WaitOutcome::TimedOut.into_parts(), (false, None));
        assert_eq!(WaitOutcome::Cancelled.into_parts(), (false, None));
        assert_eq!(
            WaitOutcome::Matched(code(1)).into_parts(),
            (true, Some(code(1)))
        );
    }
}
