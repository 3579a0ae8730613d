//! Record schemas for the live store collections
//!
//! Each collection is written by an independent upstream producer, so the
//! field naming is not uniform across records: the inventory scraper uses
//! squashed lowercase keys while the analytics pipeline uses snake_case.
//! The serde renames below pin the wire names; decoding is lenient where
//! a producer historically omitted a field.

use serde::{Deserialize, Serialize};

/// Geographic coordinate pair in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

impl LatLng {
    /// Create a coordinate pair
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// One dock station from the inventory collection.
///
/// The inventory scraper republishes the whole station list on every
/// refresh, so consumers always see a complete roster rather than deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Human-readable station name
    #[serde(default)]
    pub name: String,
    /// Latitude; absent when the upstream feed had no fix for the dock
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude; absent when the upstream feed had no fix for the dock
    #[serde(default)]
    pub lon: Option<f64>,
    /// Bikes currently available for rent
    #[serde(default, rename = "availablebikes")]
    pub available_bikes: u32,
    /// Free docking stands
    #[serde(default, rename = "availablestands")]
    pub available_stands: u32,
}

impl Station {
    /// Map position, or `None` when either coordinate is missing.
    pub fn position(&self) -> Option<LatLng> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(LatLng::new(lat, lon)),
            _ => None,
        }
    }
}

/// One telemetry sample from the analytics pipeline.
///
/// Samples carry the rider fix plus the pipeline's nearest-station
/// assessment at that moment. Coordinates are required; a sample without
/// a fix is useless and is dropped at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Rider latitude in degrees
    pub lat: f64,
    /// Rider longitude in degrees
    pub lon: f64,
    /// Name of the nearest station at sample time
    #[serde(default)]
    pub nearest_station_name: String,
    /// Straight-line distance to the nearest station in metres
    pub nearest_dist_m: f64,
    /// Estimated walking time to the nearest station in seconds
    pub nearest_walk_eta_s: f64,
    /// Bikes available at the nearest station
    #[serde(default)]
    pub nearest_bikes: u32,
    /// Free stands at the nearest station
    #[serde(default)]
    pub nearest_stands: u32,
    /// Pipeline risk assessment, forwarded verbatim
    #[serde(default)]
    pub risk_flag: String,
}

impl TelemetrySample {
    /// Rider position at sample time.
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lon)
    }
}

/// A ranked alternative station suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Suggested station name
    #[serde(default)]
    pub name: String,
    /// Distance from the rider in metres
    pub distance_m: f64,
    /// Estimated walking time in seconds
    pub walk_eta_s: f64,
    /// Bikes available at the suggested station
    #[serde(default)]
    pub available_bikes: u32,
    /// Free stands at the suggested station
    #[serde(default)]
    pub available_stands: u32,
    /// Ranking score assigned by the analytics pipeline
    pub score: f64,
}

/// One published recommendation batch.
///
/// The pipeline publishes whole batches; only the most recent batch is
/// meaningful and earlier ones are superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    /// Ranked suggestions, best first
    #[serde(default)]
    pub items: Vec<Recommendation>,
}

/// One breadcrumb of the rider's movement trail.
///
/// The trail producer names its coordinates in full, unlike the telemetry
/// pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
}

impl TrailPoint {
    /// Convert to the common coordinate type.
    pub fn latlng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}
