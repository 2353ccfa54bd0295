//! # StatusLogger: log every status message
//!
//! A ready-made listener that writes each ingested status message to
//! [`tracing`], at a level chosen from the message severity.
//!
//! ## Example output
//! ```text
//! INFO  status origin=next_player component=next_player code=4211 text=init finished
//! WARN  status origin=next_databridge component=next_databridge code=2341 text=partial subscription
//! ERROR status origin=sim_node component=radar code=5411 text=init failed
//! ```

use crate::bus::{ListenerId, StatusBus};
use crate::status::{Severity, StatusMessage};

/// Severity-aware status message logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusLogger;

impl StatusLogger {
    /// Construct a new [`StatusLogger`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Registers the logger for every message on `bus`.
    pub fn attach(self, bus: &StatusBus) -> ListenerId {
        bus.add_listener(StatusMessage::any(), move |msg| self.log(msg))
    }

    /// Logs one message.
    pub fn log(&self, msg: &StatusMessage) {
        let component = msg.component.as_deref().unwrap_or("undefined");
        let code = msg.code_str();
        let code = code.as_deref().unwrap_or("undefined");
        let origin = msg.origin.map_or("undefined", |o| o.node_name());
        let text = msg.text.as_deref().unwrap_or("");

        match msg.severity() {
            Severity::Info | Severity::Success => {
                tracing::info!(origin, component, code, text, "status");
            }
            Severity::Warning => {
                tracing::warn!(origin, component, code, text, "status");
            }
            Severity::Error | Severity::Failure => {
                tracing::error!(origin, component, code, text, "status");
            }
            Severity::Undefined => {
                tracing::debug!(origin, component, code, text, "status");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Origin;

    #[test]
    fn attaches_as_catch_all_listener() {
        let bus = StatusBus::new();
        let id = StatusLogger::new().attach(&bus);
        assert_eq!(bus.listener_count(), 1);
        assert!(bus.ingest(StatusMessage::new("radar", Origin::SimNode, 5411, "init failed")));
        assert!(bus.remove_listener(id));
    }
}
