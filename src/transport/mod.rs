//! Transport adapter: wire decoding and the ordered feed into a [`StatusBus`](crate::StatusBus).
//!
//! ## Contents
//! - [`wire`] JSON record encoding/decoding
//! - [`StatusSource`], [`StatusFeed`] single-path ingestion task

mod feed;
pub mod wire;

pub use feed::{FeedStats, StatusFeed, StatusSource};
pub use wire::WireError;
