//! View model composition
//!
//! Turns the raw collection states decoded from store snapshots into one
//! coherent, render-ready [`ViewModel`]. Nothing here talks to the store;
//! the update loop feeds the [`Composer`] and publishes what it builds.

mod composer;
mod format;

pub use composer::Composer;
pub use format::{format_distance_m, format_eta_min};

use serde::{Deserialize, Serialize};

use crate::model::{LatLng, Recommendation, Station, TelemetrySample};

/// Highest bike count still considered critical.
pub const CRITICAL_MAX_BIKES: u32 = 2;
/// Highest bike count still considered a warning.
pub const WARNING_MAX_BIKES: u32 = 7;

/// Availability banding for a station's bike count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityTier {
    /// Almost out of bikes
    Critical,
    /// Running low
    Warning,
    /// Plenty available
    Healthy,
}

impl AvailabilityTier {
    /// Band a bike count.
    pub fn for_bikes(bikes: u32) -> Self {
        if bikes <= CRITICAL_MAX_BIKES {
            Self::Critical
        } else if bikes <= WARNING_MAX_BIKES {
            Self::Warning
        } else {
            Self::Healthy
        }
    }

    /// CSS hex color drawn on the map for this tier.
    pub fn css_color(self) -> &'static str {
        match self {
            Self::Critical => "#d7191c",
            Self::Warning => "#fdae61",
            Self::Healthy => "#1a9641",
        }
    }
}

/// Composed, render-ready state of the live map.
///
/// Every field is derived; consumers treat the whole value as replaceable
/// on each publication.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    /// Stations with a usable map position
    pub stations: Vec<Station>,
    /// Rider position from the newest telemetry sample
    pub user_position: Option<LatLng>,
    /// The newest telemetry sample in full
    pub nearest: Option<TelemetrySample>,
    /// Trail polyline vertices, oldest first; empty until two points exist
    pub trail: Vec<LatLng>,
    /// Ranked alternatives from the newest recommendation batch
    pub recommendations: Vec<Recommendation>,
}
