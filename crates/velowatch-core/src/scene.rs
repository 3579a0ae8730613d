//! Declarative map scene
//!
//! The crate does not draw anything. [`MapScene`] is a serializable
//! description of what a renderer should show: camera, markers, polyline,
//! and overlay text. Any front end that can draw circles, lines, and text
//! can consume it.

use serde::{Deserialize, Serialize};

use crate::model::{LatLng, Recommendation, Station, TelemetrySample};
use crate::view::{format_distance_m, format_eta_min, AvailabilityTier, ViewModel};

/// Fallback camera center (Dublin) used until a rider fix arrives.
pub const DEFAULT_CENTER: LatLng = LatLng {
    lat: 53.3498,
    lon: -6.2603,
};
/// Camera zoom level; the map never changes zoom on its own.
pub const DEFAULT_ZOOM: u8 = 13;
/// Station marker radius in pixels
pub const STATION_MARKER_RADIUS: f64 = 8.0;
/// Station marker fill opacity
pub const STATION_MARKER_OPACITY: f64 = 0.8;
/// Trail polyline color
pub const TRAIL_COLOR: &str = "#3366ff";
/// Trail polyline weight in pixels
pub const TRAIL_WEIGHT: u32 = 3;

/// Where the map looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Center of the viewport
    pub center: LatLng,
    /// Zoom level
    pub zoom: u8,
}

/// One station drawn as a colored circle marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationMarker {
    /// Marker position
    pub position: LatLng,
    /// Availability band the color is derived from
    pub tier: AvailabilityTier,
    /// Fill and stroke color
    pub color: String,
    /// Radius in pixels
    pub radius: f64,
    /// Fill opacity
    pub fill_opacity: f64,
    /// Popup lines shown when the marker is selected
    pub popup: Vec<String>,
}

/// The rider's position marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMarker {
    /// Marker position
    pub position: LatLng,
    /// Popup label
    pub popup: String,
}

/// The movement trail polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailLine {
    /// Vertices, oldest first
    pub points: Vec<LatLng>,
    /// Stroke color
    pub color: String,
    /// Stroke weight in pixels
    pub weight: u32,
}

/// Overlay card summarizing the nearest station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestCard {
    /// e.g. `"Nearest: Charlemont Place · 215 m · 3 min"`
    pub headline: String,
    /// e.g. `"Bikes: 2 · Stands: 28 · Risk: high"`
    pub detail: String,
}

/// One row in the alternatives panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRow {
    /// Station name
    pub name: String,
    /// e.g. `"310 m · 4 min walk"`
    pub walk: String,
    /// e.g. `"Bikes: 15 · Stands: 25"`
    pub availability: String,
    /// e.g. `"Score: 0.91"`
    pub score: String,
}

/// Side panel listing alternative stations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesPanel {
    /// Panel title
    pub title: String,
    /// Ranked rows, best first
    pub rows: Vec<AlternativeRow>,
    /// Placeholder text shown instead of rows when there are none
    pub empty_message: Option<String>,
}

/// Complete description of one rendered frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapScene {
    /// Camera placement
    pub camera: Camera,
    /// Station markers
    pub stations: Vec<StationMarker>,
    /// Rider marker, absent until telemetry arrives
    pub user: Option<UserMarker>,
    /// Trail polyline, absent without a rider fix or until it has two
    /// vertices
    pub trail: Option<TrailLine>,
    /// Nearest-station card, absent until telemetry arrives
    pub nearest: Option<NearestCard>,
    /// Alternatives panel, always present
    pub alternatives: AlternativesPanel,
}

impl MapScene {
    /// Describe the scene for one view model.
    pub fn from_view(vm: &ViewModel) -> Self {
        let camera = Camera {
            center: vm.user_position.unwrap_or(DEFAULT_CENTER),
            zoom: DEFAULT_ZOOM,
        };

        let stations = vm
            .stations
            .iter()
            .filter_map(|station| {
                station
                    .position()
                    .map(|position| station_marker(station, position))
            })
            .collect();

        let user = vm.user_position.map(|position| UserMarker {
            position,
            popup: "Your location".to_string(),
        });

        // The trail draws only alongside the rider marker; feeds are
        // unordered, so trail points can land before the first fix.
        let trail = if vm.user_position.is_some() && !vm.trail.is_empty() {
            Some(TrailLine {
                points: vm.trail.clone(),
                color: TRAIL_COLOR.to_string(),
                weight: TRAIL_WEIGHT,
            })
        } else {
            None
        };

        let nearest = vm.nearest.as_ref().map(nearest_card);

        let rows: Vec<AlternativeRow> = vm.recommendations.iter().map(alternative_row).collect();
        let alternatives = AlternativesPanel {
            title: "Alternatives".to_string(),
            empty_message: if rows.is_empty() {
                Some("No nearby alternatives yet.".to_string())
            } else {
                None
            },
            rows,
        };

        Self {
            camera,
            stations,
            user,
            trail,
            nearest,
            alternatives,
        }
    }
}

fn station_marker(station: &Station, position: LatLng) -> StationMarker {
    let tier = AvailabilityTier::for_bikes(station.available_bikes);
    StationMarker {
        position,
        tier,
        color: tier.css_color().to_string(),
        radius: STATION_MARKER_RADIUS,
        fill_opacity: STATION_MARKER_OPACITY,
        popup: vec![
            station.name.clone(),
            format!("Bikes: {}", station.available_bikes),
            format!("Stands: {}", station.available_stands),
        ],
    }
}

fn nearest_card(sample: &TelemetrySample) -> NearestCard {
    NearestCard {
        headline: format!(
            "Nearest: {} · {} · {}",
            sample.nearest_station_name,
            format_distance_m(sample.nearest_dist_m),
            format_eta_min(sample.nearest_walk_eta_s)
        ),
        detail: format!(
            "Bikes: {} · Stands: {} · Risk: {}",
            sample.nearest_bikes, sample.nearest_stands, sample.risk_flag
        ),
    }
}

fn alternative_row(rec: &Recommendation) -> AlternativeRow {
    AlternativeRow {
        name: rec.name.clone(),
        walk: format!(
            "{} · {} walk",
            format_distance_m(rec.distance_m),
            format_eta_min(rec.walk_eta_s)
        ),
        availability: format!(
            "Bikes: {} · Stands: {}",
            rec.available_bikes, rec.available_stands
        ),
        score: format!("Score: {}", rec.score),
    }
}
