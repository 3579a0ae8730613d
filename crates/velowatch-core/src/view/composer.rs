//! Snapshot-to-view composition

use crate::model::{LatLng, RecommendationSet, Station, TelemetrySample, TrailPoint};

use super::ViewModel;

/// Holds the decoded state of every subscribed collection and composes
/// the [`ViewModel`] from it.
///
/// Inputs arrive one collection at a time as whole replacements; the
/// composer never merges deltas. The trail polyline is cached between
/// builds and rebuilt only when the trail input changes, since the other
/// collections update far more often than the trail grows.
#[derive(Debug, Default)]
pub struct Composer {
    stations: Vec<Station>,
    telemetry: Vec<TelemetrySample>,
    recommendation_sets: Vec<RecommendationSet>,
    trail: Vec<TrailPoint>,
    polyline: Vec<LatLng>,
    trail_dirty: bool,
}

impl Composer {
    /// Create an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the station roster.
    ///
    /// Stations without a position cannot be drawn and are dropped here,
    /// once per inventory update.
    pub fn set_stations(&mut self, stations: Vec<Station>) {
        let total = stations.len();
        self.stations = stations
            .into_iter()
            .filter(|station| station.position().is_some())
            .collect();
        let dropped = total - self.stations.len();
        if dropped > 0 {
            tracing::debug!(dropped, total, "ignoring stations without a map position");
        }
    }

    /// Replace the telemetry history for the active session.
    pub fn set_telemetry(&mut self, samples: Vec<TelemetrySample>) {
        self.telemetry = samples;
    }

    /// Replace the recommendation batches for the active session.
    pub fn set_recommendations(&mut self, sets: Vec<RecommendationSet>) {
        self.recommendation_sets = sets;
    }

    /// Replace the movement trail for the active session.
    pub fn set_trail(&mut self, points: Vec<TrailPoint>) {
        self.trail = points;
        self.trail_dirty = true;
    }

    /// Forget everything tied to the previous session.
    ///
    /// The station roster is session-independent and survives.
    pub fn clear_session_state(&mut self) {
        self.telemetry.clear();
        self.recommendation_sets.clear();
        self.trail.clear();
        self.trail_dirty = true;
    }

    /// Compose the current view model.
    pub fn build(&mut self) -> ViewModel {
        if self.trail_dirty {
            self.polyline = trail_polyline(&self.trail);
            self.trail_dirty = false;
        }

        let nearest = self.telemetry.last().cloned();
        ViewModel {
            stations: self.stations.clone(),
            user_position: nearest.as_ref().map(TelemetrySample::position),
            nearest,
            trail: self.polyline.clone(),
            recommendations: self
                .recommendation_sets
                .last()
                .map(|set| set.items.clone())
                .unwrap_or_default(),
        }
    }
}

/// A drawable polyline needs at least two vertices.
fn trail_polyline(points: &[TrailPoint]) -> Vec<LatLng> {
    if points.len() < 2 {
        return Vec::new();
    }
    points.iter().map(TrailPoint::latlng).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Recommendation;
    use pretty_assertions::assert_eq;

    fn station(name: &str, lat: Option<f64>, lon: Option<f64>) -> Station {
        Station {
            name: name.into(),
            lat,
            lon,
            available_bikes: 5,
            available_stands: 10,
        }
    }

    fn sample(lat: f64) -> TelemetrySample {
        TelemetrySample {
            lat,
            lon: -6.26,
            nearest_station_name: "Charlemont Place".into(),
            nearest_dist_m: 214.7,
            nearest_walk_eta_s: 185.0,
            nearest_bikes: 2,
            nearest_stands: 28,
            risk_flag: "high".into(),
        }
    }

    fn point(lat: f64) -> TrailPoint {
        TrailPoint {
            latitude: lat,
            longitude: -6.26,
        }
    }

    fn rec(name: &str) -> Recommendation {
        Recommendation {
            name: name.into(),
            distance_m: 310.0,
            walk_eta_s: 258.0,
            available_bikes: 15,
            available_stands: 25,
            score: 0.91,
        }
    }

    #[test]
    fn test_empty_composer_builds_empty_view() {
        let vm = Composer::new().build();
        assert_eq!(vm, ViewModel::default());
    }

    #[test]
    fn test_stations_without_position_are_dropped() {
        let mut composer = Composer::new();
        composer.set_stations(vec![
            station("A", Some(53.33), Some(-6.26)),
            station("B", None, Some(-6.26)),
            station("C", Some(53.34), None),
        ]);

        let vm = composer.build();
        let names: Vec<&str> = vm.stations.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn test_newest_telemetry_sample_wins() {
        let mut composer = Composer::new();
        composer.set_telemetry(vec![sample(1.0), sample(2.0), sample(3.0)]);

        let vm = composer.build();
        assert_eq!(vm.nearest.as_ref().map(|s| s.lat), Some(3.0));
        assert_eq!(vm.user_position, Some(LatLng::new(3.0, -6.26)));
    }

    #[test]
    fn test_no_telemetry_means_no_rider() {
        let vm = {
            let mut composer = Composer::new();
            composer.set_stations(vec![station("A", Some(53.33), Some(-6.26))]);
            composer.build()
        };

        assert_eq!(vm.nearest, None);
        assert_eq!(vm.user_position, None);
    }

    #[test]
    fn test_newest_recommendation_batch_wins() {
        let mut composer = Composer::new();
        composer.set_recommendations(vec![
            RecommendationSet {
                items: vec![rec("Old Batch")],
            },
            RecommendationSet {
                items: vec![rec("Grand Canal Dock"), rec("Heuston Station")],
            },
        ]);

        let vm = composer.build();
        let names: Vec<&str> = vm.recommendations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Grand Canal Dock", "Heuston Station"]);
    }

    #[test]
    fn test_later_empty_batch_clears_recommendations() {
        let mut composer = Composer::new();
        composer.set_recommendations(vec![
            RecommendationSet {
                items: vec![rec("Old Batch")],
            },
            RecommendationSet { items: vec![] },
        ]);

        assert!(composer.build().recommendations.is_empty());
    }

    #[test]
    fn test_single_trail_point_draws_nothing() {
        let mut composer = Composer::new();
        composer.set_trail(vec![point(1.0)]);
        assert!(composer.build().trail.is_empty());

        composer.set_trail(vec![point(1.0), point(2.0)]);
        assert_eq!(composer.build().trail.len(), 2);
    }

    #[test]
    fn test_trail_cache_refreshes_on_sliding_window() {
        // A capped trail keeps a constant length while the window slides;
        // the cached polyline must still pick up the new geometry.
        let mut composer = Composer::new();
        composer.set_trail(vec![point(0.0), point(1.0), point(2.0)]);
        assert_eq!(composer.build().trail[0].lat, 0.0);

        composer.set_trail(vec![point(1.0), point(2.0), point(3.0)]);
        assert_eq!(composer.build().trail[0].lat, 1.0);
    }

    #[test]
    fn test_build_is_stable_without_input_changes() {
        let mut composer = Composer::new();
        composer.set_trail(vec![point(0.0), point(1.0)]);
        composer.set_telemetry(vec![sample(1.0)]);

        let first = composer.build();
        let second = composer.build();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear_session_state_keeps_stations() {
        let mut composer = Composer::new();
        composer.set_stations(vec![station("A", Some(53.33), Some(-6.26))]);
        composer.set_telemetry(vec![sample(1.0)]);
        composer.set_trail(vec![point(0.0), point(1.0)]);
        composer.set_recommendations(vec![RecommendationSet {
            items: vec![rec("Grand Canal Dock")],
        }]);

        composer.clear_session_state();

        let vm = composer.build();
        assert_eq!(vm.stations.len(), 1);
        assert_eq!(vm.nearest, None);
        assert!(vm.trail.is_empty());
        assert!(vm.recommendations.is_empty());
    }
}
