//! Hierarchical store subscriptions
//!
//! The station map is driven entirely by a remote key-value store that
//! delivers the whole value at a subscribed path on every change. This
//! module holds the path/snapshot vocabulary, the [`StoreClient`] seam,
//! and the two backends: in-memory for demos and tests, REST streaming
//! for a real store instance.

mod client;
mod error;
mod memory;
mod path;
mod rest;
mod snapshot;
mod sse;

pub use client::{ConnectionState, StoreClient, SubscribeOptions, Subscription};
pub use error::StoreError;
pub use memory::MemoryStore;
pub use path::StorePath;
pub use rest::RestStore;
pub use snapshot::Snapshot;
pub use sse::{SseDecoder, SseEvent};
