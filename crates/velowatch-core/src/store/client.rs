//! Store client seam
//!
//! Everything above the transport talks to the store through
//! [`StoreClient`], so the update loop and its tests run unchanged against
//! the in-memory backend or the remote streaming one.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{Snapshot, StoreError, StorePath};

/// Connection state of a store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No live link to the store
    Disconnected,
    /// Link being established
    Connecting,
    /// Link up, snapshots flowing
    Connected,
}

/// Options for opening a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Deliver only the trailing N records of the collection
    pub limit_to_last: Option<usize>,
}

impl SubscribeOptions {
    /// Subscribe to the whole value at the path.
    pub fn all() -> Self {
        Self::default()
    }

    /// Subscribe to the trailing `n` records.
    pub fn tail(n: usize) -> Self {
        Self {
            limit_to_last: Some(n),
        }
    }
}

/// Live subscription to one store path.
///
/// The backend delivers the current value immediately and a fresh
/// [`Snapshot`] after every change. Dropping the subscription detaches it:
/// delivery stops and the backend tears down any transport state for the
/// path.
#[derive(Debug)]
pub struct Subscription {
    path: StorePath,
    events: mpsc::UnboundedReceiver<Snapshot>,
    cancel: Option<CancellationToken>,
}

impl Subscription {
    pub(crate) fn new(
        path: StorePath,
        events: mpsc::UnboundedReceiver<Snapshot>,
        cancel: Option<CancellationToken>,
    ) -> Self {
        Self {
            path,
            events,
            cancel,
        }
    }

    /// The path this subscription watches.
    pub fn path(&self) -> &StorePath {
        &self.path
    }

    /// Wait for the next snapshot.
    ///
    /// Returns `None` once the backend has gone away for good.
    pub async fn recv(&mut self) -> Option<Snapshot> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}

/// Read-side client of the hierarchical store.
pub trait StoreClient: Send + Sync {
    /// Open a live subscription to `path`.
    ///
    /// The current value is delivered as the first snapshot, then one
    /// snapshot per change.
    fn subscribe(
        &self,
        path: &StorePath,
        options: SubscribeOptions,
    ) -> Result<Subscription, StoreError>;

    /// Watch the backend's connection state.
    fn connection_state(&self) -> watch::Receiver<ConnectionState>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_options() {
        assert_eq!(SubscribeOptions::all().limit_to_last, None);
        assert_eq!(SubscribeOptions::tail(500).limit_to_last, Some(500));
    }

    #[test]
    fn test_drop_cancels_backend_task() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let sub = Subscription::new(StorePath::inventory_items(), rx, Some(token.clone()));

        assert!(!token.is_cancelled());
        drop(sub);
        assert!(token.is_cancelled());
    }
}
