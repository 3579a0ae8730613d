//! # VeloWatch Core Library
//!
//! Live shared-bike availability map, driven by a remote hierarchical
//! key-value store.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Store subscriptions with whole-snapshot delivery (in-memory and
//!   streaming REST backends)
//! - Composition of station, telemetry, recommendation, and trail
//!   collections into one render-ready view model
//! - A declarative map scene description for any renderer to draw
//! - A single-task update loop with hot session switching
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use velowatch_core::prelude::*;
//!
//! let store = Arc::new(RestStore::new("https://bikes.example.com")?);
//! let session = SessionId::new("morning-commute")?;
//! let live = LiveMap::spawn(store, session, LiveMapOptions::default())?;
//!
//! let mut frames = live.viewmodel();
//! while frames.changed().await.is_ok() {
//!     let scene = MapScene::from_view(&frames.borrow_and_update());
//!     println!("{} stations on screen", scene.stations.len());
//! }
//! ```

pub mod live;
pub mod model;
pub mod scene;
pub mod session;
pub mod store;
pub mod view;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::live::{LiveMap, LiveMapOptions, DEFAULT_TRAIL_LIMIT};
    pub use crate::model::{
        LatLng, Recommendation, RecommendationSet, Station, TelemetrySample, TrailPoint,
    };
    pub use crate::scene::MapScene;
    pub use crate::session::SessionId;
    pub use crate::store::{
        ConnectionState, MemoryStore, RestStore, Snapshot, StoreClient, StoreError, StorePath,
        SubscribeOptions, Subscription,
    };
    pub use crate::view::{AvailabilityTier, Composer, ViewModel};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
