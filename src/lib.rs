// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod chart;
pub mod config;
pub mod metrics;
pub mod news;
pub mod notify;
pub mod relay;
pub mod signal;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState, Capabilities};
pub use crate::notify::{Attachment, ChannelKind, DeliveryReceipt, Notifier, OutboundMessage};
pub use crate::relay::{fan_out, ChannelGroup, FanOutResult, FanOutTarget, SignalRelay};
pub use crate::store::{DedupStore, MemoryStore, RelayedItemRecord};
