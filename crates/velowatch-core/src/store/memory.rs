//! In-memory store backend
//!
//! A feature-complete stand-in for the remote store: same snapshot
//! delivery contract, same push-key ordering, same tail windows, no
//! network. It backs the demo feed and the update-loop tests, and it is
//! the only backend with a write surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{
    ConnectionState, Snapshot, StoreClient, StoreError, StorePath, SubscribeOptions, Subscription,
};

/// Shared in-memory store.
///
/// Clones share the same data and subscriber registry, so a producer can
/// keep one handle for writes while readers subscribe through another.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

#[derive(Debug, Default)]
struct Inner {
    /// Ordered records per collection path
    collections: HashMap<StorePath, BTreeMap<String, Value>>,
    /// Open subscriptions per path; closed ones are pruned lazily
    subscribers: HashMap<StorePath, Vec<Subscriber>>,
    /// Tie-breaker for push keys minted within the same millisecond
    key_seq: u64,
}

#[derive(Debug)]
struct Subscriber {
    id: Uuid,
    limit: Option<usize>,
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl Inner {
    /// Mint a push key: millisecond clock, then a sequence tie-breaker,
    /// then random padding. Fixed-width hex keeps lexicographic order
    /// equal to insertion order.
    fn next_key(&mut self) -> String {
        self.key_seq = self.key_seq.wrapping_add(1);
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        format!(
            "{:012x}{:06x}{:04x}",
            millis,
            self.key_seq & 0x00ff_ffff,
            rand::random::<u16>()
        )
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Connected);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            state: Arc::new(state),
        }
    }

    /// Append a record under a fresh push key and fan the new snapshot
    /// out to every subscriber of the path.
    pub fn push<T: Serialize>(&self, path: &StorePath, record: &T) -> Result<String, StoreError> {
        let value = serde_json::to_value(record)?;
        let mut inner = self.lock();
        let key = inner.next_key();
        inner
            .collections
            .entry(path.clone())
            .or_default()
            .insert(key.clone(), value);
        notify(&mut inner, path);
        Ok(key)
    }

    /// Replace the whole collection at `path`, the way the inventory
    /// scraper republishes its full roster.
    pub fn replace_all<T: Serialize>(
        &self,
        path: &StorePath,
        records: &[T],
    ) -> Result<Vec<String>, StoreError> {
        let mut values = Vec::with_capacity(records.len());
        for record in records {
            values.push(serde_json::to_value(record)?);
        }

        let mut inner = self.lock();
        let mut collection = BTreeMap::new();
        let mut keys = Vec::with_capacity(values.len());
        for value in values {
            let key = inner.next_key();
            collection.insert(key.clone(), value);
            keys.push(key);
        }
        inner.collections.insert(path.clone(), collection);
        notify(&mut inner, path);
        Ok(keys)
    }

    /// Remove everything at `path`. Subscribers see an empty snapshot.
    pub fn clear(&self, path: &StorePath) {
        let mut inner = self.lock();
        inner.collections.remove(path);
        notify(&mut inner, path);
    }

    /// Number of live subscriptions on `path`.
    pub fn subscriber_count(&self, path: &StorePath) -> usize {
        let mut inner = self.lock();
        match inner.subscribers.get_mut(path) {
            Some(subs) => {
                subs.retain(|sub| !sub.tx.is_closed());
                subs.len()
            }
            None => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned lock only means a panic elsewhere; the data is still
        // coherent for this store's operations.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreClient for MemoryStore {
    fn subscribe(
        &self,
        path: &StorePath,
        options: SubscribeOptions,
    ) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        // The receiver is still in scope, so this send cannot fail.
        let initial = snapshot_for(path, inner.collections.get(path), options.limit_to_last);
        let _ = tx.send(initial);

        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            limit: options.limit_to_last,
            tx,
        };
        tracing::debug!(path = %path, subscriber = %subscriber.id, "memory subscription opened");
        inner
            .subscribers
            .entry(path.clone())
            .or_default()
            .push(subscriber);

        Ok(Subscription::new(path.clone(), rx, None))
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        // In-process data is always reachable.
        self.state.subscribe()
    }
}

/// Deliver the current snapshot of `path` to each subscriber, dropping
/// subscribers whose receiving end has gone away.
fn notify(inner: &mut Inner, path: &StorePath) {
    let Inner {
        collections,
        subscribers,
        ..
    } = inner;
    let Some(subs) = subscribers.get_mut(path) else {
        return;
    };
    let collection = collections.get(path);
    subs.retain(|sub| {
        let snapshot = snapshot_for(path, collection, sub.limit);
        sub.tx.send(snapshot).is_ok()
    });
}

fn snapshot_for(
    path: &StorePath,
    collection: Option<&BTreeMap<String, Value>>,
    limit: Option<usize>,
) -> Snapshot {
    let value = collection.and_then(|col| {
        let skip = limit.map_or(0, |n| col.len().saturating_sub(n));
        let mut map = serde_json::Map::new();
        for (key, value) in col.iter().skip(skip) {
            map.insert(key.clone(), value.clone());
        }
        if map.is_empty() {
            None
        } else {
            Some(Value::Object(map))
        }
    });
    Snapshot::new(path.clone(), value)
}
