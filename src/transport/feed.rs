//! # StatusFeed: the single ingestion path from a transport into a bus.
//!
//! The pub/sub transport itself is external. It is consumed through
//! [`StatusSource`], which yields raw JSON payloads in publish order. A
//! [`StatusFeed`] drains one source on one task and calls
//! [`StatusBus::ingest`] for each decoded record, which gives the bus the
//! serialized delivery it relies on.
//!
//! ```text
//! transport ──► StatusSource::recv() ──► wire::decode ──► StatusBus::ingest
//!                                             │
//!                                             └─ malformed: warn + skip
//! ```
//!
//! The feed exits when the source ends, when [`StatusFeed::stop`] is called,
//! or when the bus shuts down.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::wire;
use crate::bus::StatusBus;

/// Ordered stream of raw status payloads.
#[async_trait]
pub trait StatusSource: Send + 'static {
    /// Next payload, or `None` once the transport is closed.
    async fn recv(&mut self) -> Option<String>;
}

#[async_trait]
impl StatusSource for mpsc::Receiver<String> {
    async fn recv(&mut self) -> Option<String> {
        mpsc::Receiver::recv(self).await
    }
}

#[async_trait]
impl StatusSource for mpsc::UnboundedReceiver<String> {
    async fn recv(&mut self) -> Option<String> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

/// Counters reported when a feed finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    /// Records decoded and handed to the bus.
    pub ingested: u64,
    /// Records that failed to decode.
    pub rejected: u64,
}

/// Background task pumping a [`StatusSource`] into a [`StatusBus`].
pub struct StatusFeed {
    token: CancellationToken,
    join: JoinHandle<FeedStats>,
}

impl StatusFeed {
    /// Starts pumping `source` into `bus`.
    pub fn spawn<S: StatusSource>(mut source: S, bus: StatusBus) -> Self {
        let token = bus.session_token();
        let stop = token.clone();

        let join = tokio::spawn(async move {
            let mut stats = FeedStats::default();
            loop {
                let raw = tokio::select! {
                    _ = stop.cancelled() => break,
                    raw = source.recv() => raw,
                };
                let Some(raw) = raw else { break };

                match wire::decode(&raw) {
                    Ok(msg) => {
                        if !bus.ingest(msg) {
                            break;
                        }
                        stats.ingested += 1;
                    }
                    Err(err) => {
                        stats.rejected += 1;
                        tracing::warn!(error = %err, label = err.as_label(), "status record skipped");
                    }
                }
            }
            tracing::debug!(ingested = stats.ingested, rejected = stats.rejected, "status feed stopped");
            stats
        });

        Self { token, join }
    }

    /// Creates a bounded channel source and spawns a feed on it.
    ///
    /// The returned sender is the hand-off point for a transport callback.
    pub fn channel(bus: StatusBus, capacity: usize) -> (mpsc::Sender<String>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::spawn(rx, bus))
    }

    /// Asks the feed to stop after the record in flight.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Waits for the feed task and returns its counters.
    pub async fn join(self) -> FeedStats {
        match self.join.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(error = %err, "status feed task failed");
                FeedStats::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{Origin, StatusMessage};
    use std::time::Duration;

    fn record(code: u32) -> String {
        wire::encode(&StatusMessage::new("node", Origin::SimNode, code, "t")).expect("complete")
    }

    #[tokio::test]
    async fn feeds_records_in_order_and_skips_garbage() {
        let bus = StatusBus::new();
        let (tx, feed) = StatusFeed::channel(bus.clone(), 16);

        tx.send(record(5211)).await.expect("feed alive");
        tx.send("garbage".to_owned()).await.expect("feed alive");
        tx.send(record(5241)).await.expect("feed alive");
        drop(tx);

        let stats = feed.join().await;
        assert_eq!(stats, FeedStats { ingested: 2, rejected: 1 });
        let codes: Vec<_> = bus.history().iter().filter_map(|m| m.code).collect();
        assert_eq!(codes, vec![5211, 5241]);
    }

    #[tokio::test]
    async fn bus_shutdown_stops_feed() {
        let bus = StatusBus::new();
        let (_tx, feed) = StatusFeed::channel(bus.clone(), 4);
        bus.shutdown();
        let stats = tokio::time::timeout(Duration::from_secs(1), feed.join())
            .await
            .expect("feed stops on shutdown");
        assert_eq!(stats, FeedStats::default());
    }

    #[tokio::test]
    async fn waiter_is_released_by_fed_record() {
        let bus = StatusBus::new();
        let (tx, _feed) = StatusFeed::channel(bus.clone(), 4);
        let pending = bus.prepare_wait(vec![StatusMessage::any().with_code(5211)], false);
        tx.send(record(5211)).await.expect("feed alive");
        assert!(pending.wait(Some(Duration::from_secs(1))).await.is_matched());
    }
}
