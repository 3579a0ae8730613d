//! Live map update loop
//!
//! Owns the store subscriptions and the [`Composer`], and publishes a
//! fresh [`ViewModel`] after every store change. All composition happens
//! on one task: per-path forwarder tasks funnel snapshots into a single
//! event channel, so no state is shared across threads.
//!
//! Session switches re-point the three rider-scoped subscriptions without
//! touching the station inventory one. Feeds are stamped with the session
//! generation they were opened under; snapshots still queued from an
//! earlier generation are dropped on arrival, so a torn-down session can
//! never repaint the map.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::session::SessionId;
use crate::store::{Snapshot, StoreClient, StoreError, StorePath, SubscribeOptions, Subscription};
use crate::view::{Composer, ViewModel};

/// Default tail window for the movement trail subscription.
pub const DEFAULT_TRAIL_LIMIT: usize = 500;

/// Tunables for [`LiveMap::spawn`].
#[derive(Debug, Clone, Copy)]
pub struct LiveMapOptions {
    /// Number of trail points to keep subscribed, newest last
    pub trail_limit: usize,
}

impl Default for LiveMapOptions {
    fn default() -> Self {
        Self {
            trail_limit: DEFAULT_TRAIL_LIMIT,
        }
    }
}

/// Which collection a forwarded snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedKind {
    Stations,
    Telemetry,
    Recommendations,
    Trail,
}

/// A snapshot tagged with its source feed and the session generation the
/// feed was opened under.
#[derive(Debug)]
struct FeedEvent {
    kind: FeedKind,
    generation: u64,
    snapshot: Snapshot,
}

enum Command {
    SetSession(SessionId),
    Shutdown,
}

/// Handle to a running live map.
///
/// Dropping the handle stops the update loop; [`LiveMap::shutdown`] stops
/// it and waits for teardown to finish.
pub struct LiveMap {
    commands: mpsc::UnboundedSender<Command>,
    viewmodel: watch::Receiver<ViewModel>,
    task: JoinHandle<()>,
}

impl LiveMap {
    /// Start the update loop on the current Tokio runtime.
    ///
    /// Subscribes to the station inventory and to the three collections
    /// of `session`, then publishes a composed [`ViewModel`] after every
    /// change. The first publication happens as soon as the initial
    /// snapshots arrive.
    pub fn spawn(
        client: Arc<dyn StoreClient>,
        session: SessionId,
        options: LiveMapOptions,
    ) -> Result<Self, StoreError> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (vm_tx, vm_rx) = watch::channel(ViewModel::default());

        let stations_sub =
            client.subscribe(&StorePath::inventory_items(), SubscribeOptions::all())?;
        let stations_task = spawn_feed(stations_sub, FeedKind::Stations, 0, event_tx.clone());

        let mut state = LoopState {
            client,
            session,
            generation: 0,
            options,
            composer: Composer::new(),
            vm_tx,
            event_tx,
            stations_task,
            session_tasks: Vec::new(),
        };
        state.open_session_feeds()?;

        let task = tokio::spawn(run_loop(state, event_rx, command_rx));

        Ok(Self {
            commands: command_tx,
            viewmodel: vm_rx,
            task,
        })
    }

    /// Watch the published view models.
    ///
    /// The receiver always holds the most recent value; intermediate
    /// publications may be skipped by a slow consumer, never reordered.
    pub fn viewmodel(&self) -> watch::Receiver<ViewModel> {
        self.viewmodel.clone()
    }

    /// Switch the map to another session's feeds.
    ///
    /// The rider-scoped parts of the view clear immediately; the station
    /// layer is unaffected. Switching to the already-active session does
    /// nothing.
    pub fn set_session(&self, session: SessionId) -> Result<(), StoreError> {
        self.commands
            .send(Command::SetSession(session))
            .map_err(|_| StoreError::Closed)
    }

    /// Stop the update loop and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let _ = self.task.await;
    }
}

struct LoopState {
    client: Arc<dyn StoreClient>,
    session: SessionId,
    generation: u64,
    options: LiveMapOptions,
    composer: Composer,
    vm_tx: watch::Sender<ViewModel>,
    event_tx: mpsc::UnboundedSender<FeedEvent>,
    stations_task: JoinHandle<()>,
    session_tasks: Vec<JoinHandle<()>>,
}

async fn run_loop(
    mut state: LoopState,
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::SetSession(session)) => state.switch_session(session),
                Some(Command::Shutdown) | None => break,
            },
            event = events.recv() => match event {
                Some(event) => state.apply(event),
                // state holds an event sender, so this arm only fires
                // during teardown
                None => break,
            },
        }
    }
    state.teardown();
    tracing::debug!("live map loop stopped");
}

impl LoopState {
    /// Subscribe the three rider-scoped feeds for the current session.
    fn open_session_feeds(&mut self) -> Result<(), StoreError> {
        let feeds = [
            (
                FeedKind::Telemetry,
                StorePath::telemetry_latest(&self.session),
                SubscribeOptions::all(),
            ),
            (
                FeedKind::Recommendations,
                StorePath::recommendations(&self.session),
                SubscribeOptions::all(),
            ),
            (
                FeedKind::Trail,
                StorePath::trail_points(&self.session),
                SubscribeOptions::tail(self.options.trail_limit),
            ),
        ];

        for (kind, path, options) in feeds {
            let subscription = self.client.subscribe(&path, options)?;
            self.session_tasks
                .push(spawn_feed(subscription, kind, self.generation, self.event_tx.clone()));
        }
        Ok(())
    }

    fn apply(&mut self, event: FeedEvent) {
        // A snapshot from a feed opened under an earlier session may
        // still be queued after a switch; its generation exposes it.
        if event.kind != FeedKind::Stations && event.generation != self.generation {
            tracing::debug!(kind = ?event.kind, "dropping stale snapshot from previous session");
            return;
        }

        match event.kind {
            FeedKind::Stations => self.composer.set_stations(event.snapshot.records()),
            FeedKind::Telemetry => self.composer.set_telemetry(event.snapshot.records()),
            FeedKind::Recommendations => {
                self.composer.set_recommendations(event.snapshot.records())
            }
            FeedKind::Trail => self.composer.set_trail(event.snapshot.records()),
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.vm_tx.send_replace(self.composer.build());
    }

    fn switch_session(&mut self, session: SessionId) {
        if session == self.session {
            return;
        }
        tracing::info!(from = %self.session, to = %session, "switching session");

        for task in self.session_tasks.drain(..) {
            task.abort();
        }
        self.generation += 1;
        self.session = session;
        self.composer.clear_session_state();
        self.publish();

        if let Err(error) = self.open_session_feeds() {
            // Leave the cleared view standing; the inventory layer still
            // updates.
            tracing::error!(session = %self.session, %error, "failed to subscribe session feeds");
        }
    }

    fn teardown(&mut self) {
        self.stations_task.abort();
        for task in self.session_tasks.drain(..) {
            task.abort();
        }
    }
}

/// Forward snapshots from one subscription into the loop's event channel.
///
/// Aborting the task drops the subscription, which detaches it from the
/// backend.
fn spawn_feed(
    mut subscription: Subscription,
    kind: FeedKind,
    generation: u64,
    events: mpsc::UnboundedSender<FeedEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(snapshot) = subscription.recv().await {
            let event = FeedEvent {
                kind,
                generation,
                snapshot,
            };
            if events.send(event).is_err() {
                break;
            }
        }
    })
}
