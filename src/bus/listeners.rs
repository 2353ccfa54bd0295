//! # Listener registry: wildcard matcher → callbacks.
//!
//! [`ListenerRegistry`] stores callbacks keyed by a [`StatusMessage`] matcher.
//! Many listeners may share one matcher; each gets its own [`ListenerId`].
//!
//! ## Dispatch
//! ```text
//! dispatch(msg)
//!   ├─► read lock ─► snapshot of compatible entries (registration order) ─► unlock
//!   └─► for entry in snapshot: catch_unwind(callback(msg))
//! ```
//! - No lock is held while callbacks run, so a callback may add or remove
//!   listeners (including itself) without deadlocking.
//! - A removal is never partially visible to one dispatch: the dispatch works
//!   on the snapshot taken before any callback ran.
//! - Callbacks run on the ingesting thread. A slow callback delays every other
//!   listener and every waiter for the same message.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::status::StatusMessage;

/// Callback invoked with every compatible message.
pub type Callback = Arc<dyn Fn(&StatusMessage) + Send + Sync>;

/// Identifies one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Entry {
    id: ListenerId,
    matcher: StatusMessage,
    callback: Callback,
}

/// Thread-safe multimap from matcher to callbacks.
pub struct ListenerRegistry {
    next_id: AtomicU64,
    entries: RwLock<Vec<Arc<Entry>>>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Registers `callback` for every future message compatible with `matcher`.
    pub fn add(&self, matcher: StatusMessage, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Arc::new(Entry {
            id,
            matcher,
            callback,
        }));
        id
    }

    /// Removes one listener. Returns false if it was already removed.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Removes every listener registered under a structurally equal matcher.
    pub fn remove_matching(&self, matcher: &StatusMessage) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| &e.matcher != matcher);
        before - entries.len()
    }

    /// Removes every listener.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes every listener whose matcher is compatible with `msg`.
    ///
    /// Returns the number of callbacks invoked. A panicking callback is logged
    /// and does not prevent the remaining callbacks from running.
    pub fn dispatch(&self, msg: &StatusMessage) -> usize {
        let snapshot: Vec<Arc<Entry>> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.matcher.compatible(msg))
            .cloned()
            .collect();

        for entry in &snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| (entry.callback)(msg))) {
                tracing::error!(
                    listener = entry.id.0,
                    panic = panic_message(&*panic),
                    "status listener panicked"
                );
            }
        }
        snapshot.len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Callback) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let cb: Callback = Arc::new(move |m: &StatusMessage| {
            sink.lock().push(m.code.unwrap_or_default());
        });
        (seen, cb)
    }

    #[test]
    fn component_matcher_filters_by_component_only() {
        let reg = ListenerRegistry::new();
        let (seen, cb) = recorder();
        reg.add(StatusMessage::any().with_component("X"), cb);

        reg.dispatch(&StatusMessage::any().with_component("X").with_code(1));
        reg.dispatch(&StatusMessage::any().with_component("Y").with_code(2));
        reg.dispatch(&StatusMessage::any().with_component("X").with_code(3).with_text("t"));
        reg.dispatch(&StatusMessage::any().with_code(4));

        assert_eq!(*seen.lock(), vec![1, 3]);
    }

    #[test]
    fn dispatch_follows_registration_order() {
        let reg = ListenerRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let order = Arc::clone(&order);
            reg.add(StatusMessage::any(), Arc::new(move |_| order.lock().push(tag)));
        }
        assert_eq!(reg.dispatch(&StatusMessage::any()), 3);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_by_id_is_idempotent() {
        let reg = ListenerRegistry::new();
        let (seen, cb) = recorder();
        let id = reg.add(StatusMessage::any(), cb);

        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        reg.dispatch(&StatusMessage::any().with_code(7));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn remove_matching_drops_every_entry_under_matcher() {
        let reg = ListenerRegistry::new();
        let (seen, cb) = recorder();
        let matcher = StatusMessage::any().with_code(5);
        reg.add(matcher.clone(), Arc::clone(&cb));
        reg.add(matcher.clone(), Arc::clone(&cb));
        reg.add(StatusMessage::any(), cb);

        assert_eq!(reg.remove_matching(&matcher), 2);
        reg.dispatch(&StatusMessage::any().with_code(5));
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn callback_may_remove_itself_during_dispatch() {
        let reg = Arc::new(ListenerRegistry::new());
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicU64::new(0));

        let id = {
            let reg_in = Arc::clone(&reg);
            let slot_in = Arc::clone(&slot);
            let calls_in = Arc::clone(&calls);
            reg.add(
                StatusMessage::any(),
                Arc::new(move |_| {
                    calls_in.fetch_add(1, Ordering::SeqCst);
                    if let Some(id) = *slot_in.lock() {
                        reg_in.remove(id);
                    }
                }),
            )
        };
        *slot.lock() = Some(id);

        reg.dispatch(&StatusMessage::any());
        reg.dispatch(&StatusMessage::any());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn panicking_callback_does_not_stop_dispatch() {
        let reg = ListenerRegistry::new();
        reg.add(StatusMessage::any(), Arc::new(|_| panic!("boom")));
        let (seen, cb) = recorder();
        reg.add(StatusMessage::any(), cb);

        assert_eq!(reg.dispatch(&StatusMessage::any().with_code(9)), 2);
        assert_eq!(*seen.lock(), vec![9]);
    }
}
