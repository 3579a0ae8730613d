//! VeloWatch command line front end
//!
//! Connects to a live availability store (or spins up the built-in demo
//! city) and prints one rendered map scene per view update: JSON lines
//! by default, a short human summary with `--pretty`. Logs go to stderr
//! so the scene stream on stdout stays parseable.

mod demo;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use velowatch_core::live::{LiveMap, LiveMapOptions, DEFAULT_TRAIL_LIMIT};
use velowatch_core::scene::MapScene;
use velowatch_core::session::SessionId;
use velowatch_core::store::{ConnectionState, MemoryStore, RestStore, StoreClient};
use velowatch_core::view::AvailabilityTier;

use crate::demo::DemoFeed;
use crate::settings::Settings;

#[derive(Parser)]
#[command(name = "velowatch")]
#[command(author, version, about = "Live shared-bike availability map", long_about = None)]
struct Cli {
    /// Base URL of the availability store, e.g. https://bikes.example.com
    #[arg(short, long)]
    url: Option<String>,

    /// Session whose rider feeds to follow
    #[arg(short, long)]
    session: Option<String>,

    /// Derive the session from a shared page URL (?session=...)
    #[arg(long, conflicts_with = "session")]
    page_url: Option<String>,

    /// Number of trail points to keep on screen
    #[arg(long)]
    trail_limit: Option<usize>,

    /// Run against the built-in demo city instead of a live store
    #[arg(long)]
    demo: bool,

    /// Demo feed publish interval in milliseconds
    #[arg(long, default_value = "1000")]
    demo_interval_ms: u64,

    /// Print human-readable summaries instead of JSON lines
    #[arg(short, long)]
    pretty: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let settings = settings::load();
    let session = resolve_session(&cli, &settings)?;
    let store_url = cli.url.clone().or_else(|| settings.store_url.clone());
    let trail_limit = cli
        .trail_limit
        .or(settings.trail_limit)
        .unwrap_or(DEFAULT_TRAIL_LIMIT);

    let updated = Settings {
        store_url: store_url.clone(),
        session: Some(session.as_str().to_string()),
        trail_limit: cli.trail_limit.or(settings.trail_limit),
    };
    if updated != settings {
        settings::save(&updated);
    }

    let (client, demo_task): (Arc<dyn StoreClient>, Option<JoinHandle<()>>) =
        match (cli.demo, store_url) {
            (false, Some(url)) => {
                let store = RestStore::new(&url).context("invalid store URL")?;
                tracing::info!(url = %url, "connecting to availability store");
                (Arc::new(store), None)
            }
            (true, _) | (false, None) => {
                if !cli.demo {
                    tracing::info!("no store URL configured, running the demo city");
                }
                let store = MemoryStore::new();
                let feed = DemoFeed::new(store.clone(), &session);
                // Floor the cadence so a typo cannot spin the loop.
                let period = Duration::from_millis(cli.demo_interval_ms.max(50));
                let task = tokio::spawn(feed.run(period));
                (Arc::new(store), Some(task))
            }
        };

    let conn_task = spawn_connection_logger(client.connection_state());

    let live = LiveMap::spawn(
        Arc::clone(&client),
        session.clone(),
        LiveMapOptions { trail_limit },
    )
    .context("failed to start the live map")?;
    tracing::info!(session = %session, trail_limit, "live map started");

    let mut frames = live.viewmodel();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(error) = res {
                    tracing::warn!(%error, "ctrl-c handler failed");
                }
                tracing::info!("shutting down");
                break;
            }
            changed = frames.changed() => {
                if changed.is_err() {
                    // The update loop is gone; nothing more will render.
                    break;
                }
                let scene = MapScene::from_view(&frames.borrow_and_update());
                render(&scene, cli.pretty)?;
            }
        }
    }

    live.shutdown().await;
    if let Some(task) = demo_task {
        task.abort();
    }
    conn_task.abort();
    Ok(())
}

fn setup_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Pick the session to follow: explicit flag, then shared page URL, then
/// the settings file, then the well-known default.
fn resolve_session(cli: &Cli, settings: &Settings) -> Result<SessionId> {
    if let Some(raw) = &cli.session {
        return SessionId::new(raw.clone()).context("invalid --session");
    }
    if let Some(url) = &cli.page_url {
        return Ok(SessionId::from_page_url(url));
    }
    if let Some(raw) = &settings.session {
        // A stale settings file must not stop startup.
        match SessionId::new(raw.clone()) {
            Ok(session) => return Ok(session),
            Err(error) => {
                tracing::warn!(session = %raw, %error, "ignoring session from settings file")
            }
        }
    }
    Ok(SessionId::default_session())
}

/// Log store link transitions; quiet while nothing changes.
fn spawn_connection_logger(mut state: watch::Receiver<ConnectionState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            match *state.borrow_and_update() {
                ConnectionState::Connecting => tracing::debug!("connecting to store"),
                ConnectionState::Connected => tracing::info!("store link up"),
                ConnectionState::Disconnected => tracing::warn!("store link down, will retry"),
            }
        }
    })
}

fn render(scene: &MapScene, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}\n", summarize(scene));
    } else {
        let line = serde_json::to_string(scene).context("failed to encode scene")?;
        println!("{line}");
    }
    Ok(())
}

/// Short human-readable account of one scene.
fn summarize(scene: &MapScene) -> String {
    let critical = scene
        .stations
        .iter()
        .filter(|m| m.tier == AvailabilityTier::Critical)
        .count();
    let mut out = format!(
        "{} stations on screen ({} running low)",
        scene.stations.len(),
        critical
    );
    if let Some(card) = &scene.nearest {
        out.push('\n');
        out.push_str(&card.headline);
        out.push('\n');
        out.push_str(&card.detail);
    }
    match &scene.alternatives.empty_message {
        Some(message) => {
            out.push('\n');
            out.push_str(message);
        }
        None => {
            for row in &scene.alternatives.rows {
                out.push('\n');
                out.push_str(&format!(
                    "  {} · {} · {}",
                    row.name, row.walk, row.availability
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use velowatch_core::model::{Recommendation, TelemetrySample};
    use velowatch_core::view::ViewModel;

    #[test]
    fn test_session_prefers_explicit_flag() {
        let cli = Cli::parse_from(["velowatch", "--session", "ride-1"]);
        let settings = Settings {
            session: Some("ride-2".into()),
            ..Settings::default()
        };
        assert_eq!(resolve_session(&cli, &settings).unwrap().as_str(), "ride-1");
    }

    #[test]
    fn test_session_falls_back_to_settings_then_default() {
        let cli = Cli::parse_from(["velowatch"]);
        let settings = Settings {
            session: Some("ride-2".into()),
            ..Settings::default()
        };
        assert_eq!(resolve_session(&cli, &settings).unwrap().as_str(), "ride-2");
        assert_eq!(
            resolve_session(&cli, &Settings::default()).unwrap().as_str(),
            "demo-session"
        );
    }

    #[test]
    fn test_session_from_page_url() {
        let cli = Cli::parse_from([
            "velowatch",
            "--page-url",
            "https://example.com/map?session=trip-9",
        ]);
        assert_eq!(
            resolve_session(&cli, &Settings::default()).unwrap().as_str(),
            "trip-9"
        );
    }

    #[test]
    fn test_invalid_session_flag_is_an_error() {
        let cli = Cli::parse_from(["velowatch", "--session", "a/b"]);
        assert!(resolve_session(&cli, &Settings::default()).is_err());
    }

    #[test]
    fn test_summary_of_empty_scene() {
        let text = summarize(&MapScene::from_view(&ViewModel::default()));
        assert!(text.contains("0 stations"), "{text}");
        assert!(text.contains("No nearby alternatives yet."), "{text}");
    }

    #[test]
    fn test_summary_shows_nearest_and_alternatives() {
        let vm = ViewModel {
            nearest: Some(TelemetrySample {
                lat: 53.33,
                lon: -6.26,
                nearest_station_name: "Charlemont Place".into(),
                nearest_dist_m: 214.7,
                nearest_walk_eta_s: 185.0,
                nearest_bikes: 2,
                nearest_stands: 28,
                risk_flag: "high".into(),
            }),
            recommendations: vec![Recommendation {
                name: "Grand Canal Dock".into(),
                distance_m: 310.0,
                walk_eta_s: 258.0,
                available_bikes: 15,
                available_stands: 25,
                score: 0.91,
            }],
            ..ViewModel::default()
        };

        let text = summarize(&MapScene::from_view(&vm));
        assert!(text.contains("Nearest: Charlemont Place · 215 m · 3 min"), "{text}");
        assert!(text.contains("Grand Canal Dock"), "{text}");
    }
}
