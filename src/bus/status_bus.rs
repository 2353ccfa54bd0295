//! # StatusBus: the single ingestion point for status events.
//!
//! [`StatusBus`] composes the session [`EventHistory`], the
//! [`ListenerRegistry`] and the [`WaitRegistry`]. The transport adapter calls
//! [`StatusBus::ingest`] once per delivered message, from one logical stream.
//!
//! ## Architecture
//! ```text
//! transport ──► ingest(msg)
//!                 ├─► EventHistory::append      (complete + pending logs)
//!                 ├─► ListenerRegistry::dispatch (snapshot, registration order)
//!                 └─► WaitRegistry::deliver      (first matching ticket)
//!
//! callers ──► wait_for_any(matchers, timeout, consider_history)
//!               ├─ consider_history && history hit ─► Matched (no ticket)
//!               └─ register ticket ─► await oneshot ─► Matched | TimedOut | Cancelled
//! ```
//!
//! ## Rules
//! - Dispatch and delivery happen synchronously inside `ingest`, so anything
//!   registered before an `ingest` call observes that message, in ingest order.
//! - `ingest` never awaits and never blocks on a waiter.
//! - The bus does not order concurrent `ingest` callers; the transport must
//!   serialize deliveries (see [`StatusFeed`](crate::StatusFeed)).
//! - [`shutdown`](StatusBus::shutdown) is idempotent: it disables ingestion,
//!   wakes all waiters with [`WaitOutcome::Cancelled`], drops all listeners and
//!   cancels the session token observed by transport feeds.
//!
//! ## History replay race
//! With `consider_history = true` the history is checked **before** the ticket
//! is registered. A message ingested strictly between the two steps is missed.
//! Callers that cannot tolerate this should use [`StatusBus::prepare_wait`]
//! before triggering the event they wait for.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::history::EventHistory;
use super::listeners::{Callback, ListenerId, ListenerRegistry};
use super::waits::{PendingWait, WaitOutcome, WaitRegistry};
use crate::status::{Origin, StatusMessage};

struct Inner {
    history: EventHistory,
    listeners: ListenerRegistry,
    waits: Arc<WaitRegistry>,
    closed: AtomicBool,
    session: CancellationToken,
}

/// Status event bus for one backend session.
///
/// Cheap to clone; all clones share the same registries.
#[derive(Clone)]
pub struct StatusBus {
    inner: Arc<Inner>,
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StatusBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBus")
            .field("closed", &self.is_closed())
            .field("history", &self.inner.history.len())
            .field("listeners", &self.inner.listeners.len())
            .field("waits", &self.inner.waits.len())
            .finish()
    }
}

impl StatusBus {
    /// Opens a new session.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                history: EventHistory::new(),
                listeners: ListenerRegistry::new(),
                waits: Arc::new(WaitRegistry::new()),
                closed: AtomicBool::new(false),
                session: CancellationToken::new(),
            }),
        }
    }

    /// Processes one delivered message: history, listeners, then waiters.
    ///
    /// Returns false (and does nothing) after [`shutdown`](Self::shutdown).
    pub fn ingest(&self, msg: StatusMessage) -> bool {
        if self.is_closed() {
            tracing::debug!(%msg, "status dropped: bus shut down");
            return false;
        }
        tracing::trace!(%msg, "status ingested");

        self.inner.history.append(&msg);
        self.inner.listeners.dispatch(&msg);
        self.inner.waits.deliver(&msg);
        true
    }

    /// Registers `callback` for every future message compatible with `matcher`.
    pub fn add_listener<F>(&self, matcher: StatusMessage, callback: F) -> ListenerId
    where
        F: Fn(&StatusMessage) + Send + Sync + 'static,
    {
        self.add_listener_arc(matcher, Arc::new(callback))
    }

    /// Same as [`add_listener`](Self::add_listener) for an already shared callback.
    pub fn add_listener_arc(&self, matcher: StatusMessage, callback: Callback) -> ListenerId {
        self.inner.listeners.add(matcher, callback)
    }

    /// Registers a listener from optional matcher parts.
    pub fn listen<F>(
        &self,
        component: Option<&str>,
        origin: Option<Origin>,
        code: Option<u32>,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&StatusMessage) + Send + Sync + 'static,
    {
        self.add_listener(StatusMessage::matcher(component, origin, code), callback)
    }

    /// Removes one listener. A second call with the same id is a no-op.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Removes all listeners registered under a structurally equal matcher.
    pub fn remove_listeners(&self, matcher: &StatusMessage) -> usize {
        self.inner.listeners.remove_matching(matcher)
    }

    /// Removes every listener.
    pub fn remove_all_listeners(&self) {
        self.inner.listeners.clear();
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Number of waits currently blocked on the bus.
    pub fn pending_waits(&self) -> usize {
        self.inner.waits.len()
    }

    /// Waits for one message compatible with the given parts.
    pub async fn wait_for(
        &self,
        component: Option<&str>,
        origin: Option<Origin>,
        code: Option<u32>,
        timeout: Option<Duration>,
        consider_history: bool,
    ) -> WaitOutcome {
        let matcher = StatusMessage::matcher(component, origin, code);
        self.wait_for_any(vec![matcher], timeout, consider_history)
            .await
    }

    /// Waits for one message compatible with any of `matchers`.
    ///
    /// `timeout = None` waits indefinitely (until matched or shutdown).
    ///
    /// # Panics
    /// Panics if `matchers` is empty.
    pub async fn wait_for_any(
        &self,
        matchers: Vec<StatusMessage>,
        timeout: Option<Duration>,
        consider_history: bool,
    ) -> WaitOutcome {
        let outcome = self
            .prepare_wait(matchers, consider_history)
            .wait(timeout)
            .await;
        tracing::debug!(outcome = outcome.as_label(), "status wait finished");
        outcome
    }

    /// Sets up a wait without awaiting it.
    ///
    /// The returned [`PendingWait`] already observes every later `ingest`, so a
    /// caller can prepare, trigger the awaited event (e.g. spawn a process),
    /// then await without a lost-wakeup window.
    ///
    /// # Panics
    /// Panics if `matchers` is empty.
    pub fn prepare_wait(&self, matchers: Vec<StatusMessage>, consider_history: bool) -> PendingWait {
        if consider_history {
            self.prepare_wait_since(matchers, 0)
        } else {
            self.prepare_wait_since(matchers, u64::MAX)
        }
    }

    /// Like [`prepare_wait`](Self::prepare_wait), replaying only history
    /// recorded at or after `mark` (see [`history_mark`](Self::history_mark)).
    ///
    /// # Panics
    /// Panics if `matchers` is empty.
    pub fn prepare_wait_since(&self, matchers: Vec<StatusMessage>, mark: u64) -> PendingWait {
        assert!(!matchers.is_empty(), "a wait needs at least one matcher");

        if self.is_closed() {
            return PendingWait::closed();
        }
        if let Some(hit) = self.inner.history.find_since(&matchers, mark) {
            return PendingWait::ready(hit);
        }
        match self.inner.waits.register(matchers) {
            Some((id, rx)) => PendingWait::waiting(Arc::clone(&self.inner.waits), id, rx),
            None => PendingWait::closed(),
        }
    }

    /// History position of the next ingested message.
    ///
    /// Waits prepared with this mark ignore everything ingested before it.
    pub fn history_mark(&self) -> u64 {
        self.inner.history.mark()
    }

    /// Messages ingested since the previous call.
    pub fn drain_pending(&self) -> Vec<StatusMessage> {
        self.inner.history.drain_pending()
    }

    /// Copy of every message ingested this session (oldest first).
    pub fn history(&self) -> Vec<StatusMessage> {
        self.inner.history.snapshot()
    }

    /// Oldest ingested message compatible with any of `matchers`.
    pub fn find_in_history(&self, matchers: &[StatusMessage]) -> Option<StatusMessage> {
        self.inner.history.find(matchers)
    }

    /// Clears the history; listeners and pending waits survive.
    pub fn reset(&self) {
        self.inner.history.reset();
    }

    /// Token cancelled when the bus shuts down (child of the session token).
    pub fn session_token(&self) -> CancellationToken {
        self.inner.session.child_token()
    }

    /// True after [`shutdown`](Self::shutdown).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Ends the session. Safe to call more than once.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.session.cancel();
        let woken = self.inner.waits.cancel_all();
        self.inner.listeners.clear();
        self.inner.history.reset();
        tracing::info!(cancelled_waits = woken, "status bus shut down");
    }
}
