//! Remote store backend
//!
//! Subscribes to store paths over the streaming REST surface. The server
//! sends incremental change events; a per-subscription worker applies
//! them to a local mirror of the path and delivers a whole snapshot after
//! every change, so consumers never see deltas.
//!
//! Connection loss is handled inside the worker: it reconnects with
//! exponential backoff and simply stops delivering while offline, leaving
//! the consumer's last snapshot standing.
//!
//! The backend's connection signal reports the healthiest live stream, so
//! one path riding out a reconnect does not flip the signal while the
//! other subscriptions are still delivering.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::{
    ConnectionState, Snapshot, SseDecoder, SseEvent, StoreClient, StoreError, StorePath,
    SubscribeOptions, Subscription,
};

/// Delay before the first reconnect attempt
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Ceiling for the reconnect delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Client for a remote store instance.
#[derive(Debug, Clone)]
pub struct RestStore {
    /// Base URL without trailing slash
    base: String,
    client: reqwest::Client,
    health: Arc<LinkHealth>,
}

impl RestStore {
    /// Create a client for the store at `base_url`.
    ///
    /// The URL is validated here so a misconfigured instance fails at
    /// startup instead of at first subscribe.
    pub fn new(base_url: &str) -> Result<Self, StoreError> {
        let base = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base).map_err(|error| StoreError::InvalidUrl {
            url: base.clone(),
            reason: error.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("velowatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base,
            client,
            health: Arc::new(LinkHealth::new()),
        })
    }

    /// Build the streaming URL for one path, with the tail-window query
    /// parameters the server expects.
    fn stream_url(
        &self,
        path: &StorePath,
        limit: Option<usize>,
    ) -> Result<reqwest::Url, StoreError> {
        let raw = format!("{}{}.json", self.base, path.as_str());
        let mut url = reqwest::Url::parse(&raw).map_err(|error| StoreError::InvalidUrl {
            url: raw.clone(),
            reason: error.to_string(),
        })?;
        if let Some(n) = limit {
            // The server wants the literal quotes around $key.
            url.query_pairs_mut()
                .append_pair("orderBy", "\"$key\"")
                .append_pair("limitToLast", &n.to_string());
        }
        Ok(url)
    }
}

impl StoreClient for RestStore {
    fn subscribe(
        &self,
        path: &StorePath,
        options: SubscribeOptions,
    ) -> Result<Subscription, StoreError> {
        let url = self.stream_url(path, options.limit_to_last)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = StreamWorker {
            client: self.client.clone(),
            url,
            path: path.clone(),
            tx,
            slot: LinkHealth::register(&self.health),
        };
        tokio::spawn(worker.run(cancel.clone()));

        Ok(Subscription::new(path.clone(), rx, Some(cancel)))
    }

    fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.health.subscribe()
    }
}

/// Link signal aggregated across all stream workers.
///
/// Each worker reports its own state through a [`LinkSlot`]; the watch
/// channel carries the best state among live streams. A dropped slot is
/// a subscriber teardown, not a connection loss, and leaves the signal
/// to the remaining streams.
#[derive(Debug)]
struct LinkHealth {
    slots: Mutex<SlotTable>,
    state: watch::Sender<ConnectionState>,
}

#[derive(Debug, Default)]
struct SlotTable {
    next_id: u64,
    states: HashMap<u64, ConnectionState>,
}

impl LinkHealth {
    fn new() -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            slots: Mutex::new(SlotTable::default()),
            state,
        }
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn register(health: &Arc<Self>) -> LinkSlot {
        let id = {
            let mut table = health.table();
            let id = table.next_id;
            table.next_id += 1;
            table.states.insert(id, ConnectionState::Connecting);
            id
        };
        health.publish();
        LinkSlot {
            health: Arc::clone(health),
            id,
        }
    }

    fn set(&self, id: u64, state: ConnectionState) {
        self.table().states.insert(id, state);
        self.publish();
    }

    fn release(&self, id: u64) {
        let any_left = {
            let mut table = self.table();
            table.states.remove(&id);
            !table.states.is_empty()
        };
        if any_left {
            self.publish();
        }
    }

    fn publish(&self) {
        let best = self
            .table()
            .states
            .values()
            .copied()
            .max_by_key(|state| link_rank(*state));
        if let Some(best) = best {
            self.state.send_replace(best);
        }
    }

    fn table(&self) -> MutexGuard<'_, SlotTable> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn link_rank(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::Disconnected => 0,
        ConnectionState::Connecting => 1,
        ConnectionState::Connected => 2,
    }
}

/// One worker's handle into the shared link signal.
struct LinkSlot {
    health: Arc<LinkHealth>,
    id: u64,
}

impl LinkSlot {
    fn set(&self, state: ConnectionState) {
        self.health.set(self.id, state);
    }
}

impl Drop for LinkSlot {
    fn drop(&mut self) {
        self.health.release(self.id);
    }
}

/// Why one streaming attempt ended.
enum StreamEnd {
    /// The subscription was dropped; tear down for good
    SubscriberGone,
    /// Transport or server ended the stream; try again
    Reconnect { reason: String, was_connected: bool },
}

/// What an individual stream event did to the mirror.
enum Applied {
    Changed,
    Ignored,
    Reconnect,
}

/// Incremental change payload: the affected path relative to the
/// subscription root, and the new value at that path.
#[derive(Debug, Deserialize)]
struct ChangeEvent {
    path: String,
    data: Value,
}

struct StreamWorker {
    client: reqwest::Client,
    url: reqwest::Url,
    path: StorePath,
    tx: mpsc::UnboundedSender<Snapshot>,
    slot: LinkSlot,
}

impl StreamWorker {
    async fn run(mut self, cancel: CancellationToken) {
        let mut mirror = Value::Null;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            self.slot.set(ConnectionState::Connecting);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return,
                outcome = self.stream_once(&mut mirror) => outcome,
            };

            match outcome {
                // Dropping the slot releases this stream's share of the
                // link signal without reporting a connection loss.
                StreamEnd::SubscriberGone => return,
                StreamEnd::Reconnect {
                    reason,
                    was_connected,
                } => {
                    self.slot.set(ConnectionState::Disconnected);
                    if was_connected {
                        backoff = INITIAL_BACKOFF;
                    }
                    tracing::warn!(
                        path = %self.path,
                        reason,
                        delay_ms = backoff.as_millis() as u64,
                        "stream ended, reconnecting"
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = backoff.saturating_mul(2).min(MAX_BACKOFF);
        }
    }

    /// One connection attempt: open the stream, mirror events, deliver
    /// snapshots until something ends the stream.
    async fn stream_once(&mut self, mirror: &mut Value) -> StreamEnd {
        let request = self
            .client
            .get(self.url.clone())
            .header(header::ACCEPT, "text/event-stream");
        let response = match request.send().await.and_then(|r| r.error_for_status()) {
            Ok(response) => response,
            Err(error) => {
                return StreamEnd::Reconnect {
                    reason: error.to_string(),
                    was_connected: false,
                }
            }
        };

        self.slot.set(ConnectionState::Connected);
        tracing::debug!(path = %self.path, "stream connected");

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    return StreamEnd::Reconnect {
                        reason: error.to_string(),
                        was_connected: true,
                    }
                }
            };

            for event in decoder.push(&chunk) {
                match apply_event(mirror, &event) {
                    Ok(Applied::Changed) => {
                        if self.tx.send(mirror_snapshot(&self.path, mirror)).is_err() {
                            return StreamEnd::SubscriberGone;
                        }
                    }
                    Ok(Applied::Ignored) => {}
                    Ok(Applied::Reconnect) => {
                        return StreamEnd::Reconnect {
                            reason: format!("server sent {}", event.event),
                            was_connected: true,
                        };
                    }
                    Err(error) => {
                        tracing::warn!(
                            path = %self.path,
                            event = %event.event,
                            %error,
                            "undecodable stream event, skipping"
                        );
                    }
                }
            }
        }

        StreamEnd::Reconnect {
            reason: "stream closed by server".to_string(),
            was_connected: true,
        }
    }
}

fn apply_event(mirror: &mut Value, event: &SseEvent) -> Result<Applied, serde_json::Error> {
    match event.event.as_str() {
        "put" => {
            let change: ChangeEvent = serde_json::from_str(&event.data)?;
            apply_put(mirror, &change.path, change.data);
            Ok(Applied::Changed)
        }
        "patch" => {
            let change: ChangeEvent = serde_json::from_str(&event.data)?;
            apply_patch(mirror, &change.path, change.data);
            Ok(Applied::Changed)
        }
        "keep-alive" => Ok(Applied::Ignored),
        // The server revokes the stream when access rules or credentials
        // change; a fresh connection renegotiates.
        "cancel" | "auth_revoked" => Ok(Applied::Reconnect),
        other => {
            tracing::debug!(event = other, "ignoring unknown stream event");
            Ok(Applied::Ignored)
        }
    }
}

/// Replace the value at `path` inside the mirror, materializing
/// intermediate objects. A null value deletes the node.
fn apply_put(mirror: &mut Value, path: &str, data: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((leaf, parents)) = segments.split_last() else {
        *mirror = data;
        return;
    };

    let mut node = mirror;
    for segment in parents {
        if !node.is_object() {
            *node = Value::Object(serde_json::Map::new());
        }
        node = match node {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            _ => return,
        };
    }

    if !node.is_object() {
        *node = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = node {
        if data.is_null() {
            map.remove(*leaf);
        } else {
            map.insert(leaf.to_string(), data);
        }
    }
}

/// Merge the children of `data` into the node at `path`; null children
/// delete their key.
fn apply_patch(mirror: &mut Value, path: &str, data: Value) {
    match data {
        Value::Object(children) => {
            let base = path.trim_matches('/');
            for (key, value) in children {
                let child_path = if base.is_empty() {
                    format!("/{key}")
                } else {
                    format!("/{base}/{key}")
                };
                apply_put(mirror, &child_path, value);
            }
        }
        other => apply_put(mirror, path, other),
    }
}

fn mirror_snapshot(path: &StorePath, mirror: &Value) -> Snapshot {
    let value = match mirror {
        Value::Null => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.clone()),
    };
    Snapshot::new(path.clone(), value)
}
