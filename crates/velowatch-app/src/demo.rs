//! Demo mode - simulated city feed for running without a live store
//!
//! Generates a plausible shared-bike city for trying the map offline: a
//! fixed dock roster whose availability drifts over time, and a rider
//! moving between docks, publishing telemetry, trail points, and ranked
//! alternatives the way the real analytics pipeline would.

use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use velowatch_core::model::{
    LatLng, Recommendation, RecommendationSet, Station, TelemetrySample, TrailPoint,
};
use velowatch_core::session::SessionId;
use velowatch_core::store::{MemoryStore, StoreError, StorePath};
use velowatch_core::view::CRITICAL_MAX_BIKES;

/// Metres per degree of latitude, good enough at city scale.
const METERS_PER_DEG_LAT: f64 = 111_320.0;

/// Walking speed the analytics pipeline assumes, in metres per second.
const WALK_SPEED_MPS: f64 = 1.2;

/// Dock roster for the simulated city: real Dublin locations with
/// plausible capacities.
const ROSTER: &[(&str, f64, f64, u32)] = &[
    ("Portobello Harbour", 53.3304, -6.2635, 30),
    ("Smithfield North", 53.3497, -6.2781, 30),
    ("Charlemont Place", 53.3307, -6.2568, 40),
    ("Grand Canal Dock", 53.3426, -6.2384, 40),
    ("Heuston Station", 53.3468, -6.2946, 40),
    ("Eden Quay", 53.3478, -6.2562, 30),
    ("Parnell Square North", 53.3537, -6.2654, 20),
    ("Merrion Square East", 53.3394, -6.2466, 30),
];

/// One simulated dock with its live bike count.
struct DemoDock {
    name: &'static str,
    position: LatLng,
    capacity: u32,
    bikes: u32,
}

impl DemoDock {
    fn as_station(&self) -> Station {
        Station {
            name: self.name.to_string(),
            lat: Some(self.position.lat),
            lon: Some(self.position.lon),
            available_bikes: self.bikes,
            available_stands: self.capacity - self.bikes,
        }
    }
}

/// Adds the publish timestamp the upstream producers write alongside
/// each record. Readers ignore it; it keeps the demo data shaped like
/// the real thing.
#[derive(Serialize)]
struct Stamped<T: Serialize> {
    #[serde(flatten)]
    record: T,
    ts: String,
}

impl<T: Serialize> Stamped<T> {
    fn now(record: T) -> Self {
        Self {
            record,
            ts: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Simulated city feed that publishes through a [`MemoryStore`].
pub struct DemoFeed {
    /// Write handle; the map subscribes through a clone of the same store
    store: MemoryStore,
    /// Dock roster with live bike counts
    docks: Vec<DemoDock>,
    /// Current rider position
    rider: LatLng,
    /// Index of the dock the rider is heading to
    target: usize,
    /// Ticks elapsed since the feed started
    ticks: u64,
    /// Random number generator (seedable for tests)
    rng: StdRng,
    /// Station inventory collection
    inventory_path: StorePath,
    /// Telemetry collection for the demo session
    telemetry_path: StorePath,
    /// Recommendation collection for the demo session
    recommendations_path: StorePath,
    /// Trail collection for the demo session
    trail_path: StorePath,
}

impl DemoFeed {
    /// Create a feed seeded from OS entropy.
    pub fn new(store: MemoryStore, session: &SessionId) -> Self {
        Self::with_rng(store, session, StdRng::from_entropy())
    }

    /// Create a feed with a fixed seed, for deterministic tests.
    pub fn with_seed(store: MemoryStore, session: &SessionId, seed: u64) -> Self {
        Self::with_rng(store, session, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: MemoryStore, session: &SessionId, mut rng: StdRng) -> Self {
        let docks: Vec<DemoDock> = ROSTER
            .iter()
            .map(|&(name, lat, lon, capacity)| DemoDock {
                name,
                position: LatLng::new(lat, lon),
                capacity,
                bikes: rng.gen_range(capacity / 4..=capacity * 3 / 4),
            })
            .collect();
        let rider = docks[0].position;
        let target = rng.gen_range(1..docks.len());

        Self {
            store,
            docks,
            rider,
            target,
            ticks: 0,
            rng,
            inventory_path: StorePath::inventory_items(),
            telemetry_path: StorePath::telemetry_latest(session),
            recommendations_path: StorePath::recommendations(session),
            trail_path: StorePath::trail_points(session),
        }
    }

    /// Publish on a fixed cadence until the task is dropped.
    pub async fn run(mut self, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if let Err(error) = self.tick() {
                tracing::warn!(error = %error, "demo feed tick failed");
            }
        }
    }

    /// Advance the simulation one step and publish the results.
    pub fn tick(&mut self) -> Result<(), StoreError> {
        const INVENTORY_EVERY_TICKS: u64 = 3;
        const RECOMMENDATIONS_EVERY_TICKS: u64 = 4;

        self.drift_inventory();
        if self.ticks % INVENTORY_EVERY_TICKS == 0 {
            let roster: Vec<Station> = self.docks.iter().map(DemoDock::as_station).collect();
            self.store.replace_all(&self.inventory_path, &roster)?;
        }

        self.move_rider();
        let breadcrumb = TrailPoint {
            latitude: self.rider.lat,
            longitude: self.rider.lon,
        };
        self.store.push(&self.trail_path, &Stamped::now(breadcrumb))?;

        let (nearest, dist) = self.nearest_dock();
        let sample = TelemetrySample {
            lat: self.rider.lat,
            lon: self.rider.lon,
            nearest_station_name: nearest.name.to_string(),
            nearest_dist_m: dist,
            nearest_walk_eta_s: dist / WALK_SPEED_MPS,
            nearest_bikes: nearest.bikes,
            nearest_stands: nearest.capacity - nearest.bikes,
            risk_flag: risk_flag(nearest.bikes).to_string(),
        };
        self.store.push(&self.telemetry_path, &Stamped::now(sample))?;

        if self.ticks % RECOMMENDATIONS_EVERY_TICKS == 0 {
            let set = self.build_recommendations();
            self.store.push(&self.recommendations_path, &Stamped::now(set))?;
        }

        self.ticks += 1;
        Ok(())
    }

    /// Occasional single-bike arrivals and departures, capped by dock
    /// capacity.
    fn drift_inventory(&mut self) {
        for dock in &mut self.docks {
            if self.rng.gen_bool(0.3) {
                let delta: i64 = if self.rng.gen_bool(0.5) { 1 } else { -1 };
                let next = i64::from(dock.bikes) + delta;
                dock.bikes = next.clamp(0, i64::from(dock.capacity)) as u32;
            }
        }
    }

    /// Step toward the target dock; pick a new one on arrival.
    fn move_rider(&mut self) {
        const ARRIVE_RADIUS_M: f64 = 25.0;

        let target = self.docks[self.target].position;
        let dist = meters_between(self.rider, target);
        if dist <= ARRIVE_RADIUS_M {
            self.pick_next_target();
            return;
        }

        // Brisk demo pace so the map visibly moves; small jitter stands
        // in for GPS noise.
        let step = self.rng.gen_range(15.0..30.0_f64).min(dist);
        let frac = step / dist;
        let jitter_m: f64 = self.rng.gen_range(-2.0..2.0);
        let lat_per_m = 1.0 / METERS_PER_DEG_LAT;
        let lon_per_m = 1.0 / (METERS_PER_DEG_LAT * self.rider.lat.to_radians().cos());
        self.rider.lat += (target.lat - self.rider.lat) * frac + jitter_m * lat_per_m;
        self.rider.lon += (target.lon - self.rider.lon) * frac + jitter_m * lon_per_m;
    }

    fn pick_next_target(&mut self) {
        let next = self.rng.gen_range(0..self.docks.len());
        self.target = if next == self.target {
            (next + 1) % self.docks.len()
        } else {
            next
        };
    }

    fn nearest_dock(&self) -> (&DemoDock, f64) {
        let mut best = &self.docks[0];
        let mut best_dist = meters_between(self.rider, best.position);
        for dock in &self.docks[1..] {
            let dist = meters_between(self.rider, dock.position);
            if dist < best_dist {
                best = dock;
                best_dist = dist;
            }
        }
        (best, best_dist)
    }

    /// Rank every dock except the nearest by availability discounted by
    /// distance, the way the real pipeline scores alternatives.
    fn build_recommendations(&self) -> RecommendationSet {
        const MAX_ITEMS: usize = 5;

        let (nearest, _) = self.nearest_dock();
        let mut items: Vec<Recommendation> = self
            .docks
            .iter()
            .filter(|dock| dock.name != nearest.name)
            .map(|dock| {
                let dist = meters_between(self.rider, dock.position);
                let availability = f64::from(dock.bikes) / f64::from(dock.capacity);
                Recommendation {
                    name: dock.name.to_string(),
                    distance_m: dist,
                    walk_eta_s: dist / WALK_SPEED_MPS,
                    available_bikes: dock.bikes,
                    available_stands: dock.capacity - dock.bikes,
                    score: availability / (1.0 + dist / 400.0),
                }
            })
            .collect();
        items.sort_by(|a, b| b.score.total_cmp(&a.score));
        items.truncate(MAX_ITEMS);
        RecommendationSet { items }
    }
}

fn risk_flag(bikes: u32) -> &'static str {
    if bikes <= CRITICAL_MAX_BIKES {
        "high"
    } else {
        "normal"
    }
}

/// Equirectangular distance in metres, accurate at city scale.
fn meters_between(a: LatLng, b: LatLng) -> f64 {
    let mean_lat = ((a.lat + b.lat) / 2.0).to_radians();
    let dx = (b.lon - a.lon) * METERS_PER_DEG_LAT * mean_lat.cos();
    let dy = (b.lat - a.lat) * METERS_PER_DEG_LAT;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use velowatch_core::store::{StoreClient, SubscribeOptions};

    fn session() -> SessionId {
        SessionId::new("demo-test").unwrap()
    }

    #[tokio::test]
    async fn test_first_tick_publishes_every_feed() {
        let store = MemoryStore::new();
        let mut feed = DemoFeed::with_seed(store.clone(), &session(), 7);
        feed.tick().unwrap();

        let mut inventory = store
            .subscribe(&StorePath::inventory_items(), SubscribeOptions::all())
            .unwrap();
        let stations: Vec<Station> = inventory.recv().await.unwrap().records();
        assert_eq!(stations.len(), ROSTER.len());
        for station in &stations {
            assert!(station.position().is_some(), "{} has no fix", station.name);
        }

        let mut telemetry = store
            .subscribe(
                &StorePath::telemetry_latest(&session()),
                SubscribeOptions::all(),
            )
            .unwrap();
        let samples: Vec<TelemetrySample> = telemetry.recv().await.unwrap().records();
        assert_eq!(samples.len(), 1);

        let mut trail = store
            .subscribe(
                &StorePath::trail_points(&session()),
                SubscribeOptions::all(),
            )
            .unwrap();
        let points: Vec<TrailPoint> = trail.recv().await.unwrap().records();
        assert_eq!(points.len(), 1);

        let mut recs = store
            .subscribe(
                &StorePath::recommendations(&session()),
                SubscribeOptions::all(),
            )
            .unwrap();
        let set: RecommendationSet = recs.recv().await.unwrap().latest().unwrap();
        assert!(!set.items.is_empty());
        assert!(set.items.len() <= 5);
    }

    #[tokio::test]
    async fn test_dock_counts_conserve_capacity() {
        let store = MemoryStore::new();
        let mut feed = DemoFeed::with_seed(store.clone(), &session(), 11);

        let totals = |stations: &[Station]| -> HashMap<String, u32> {
            stations
                .iter()
                .map(|s| (s.name.clone(), s.available_bikes + s.available_stands))
                .collect()
        };

        for _ in 0..10 {
            feed.tick().unwrap();
        }
        let mut sub = store
            .subscribe(&StorePath::inventory_items(), SubscribeOptions::all())
            .unwrap();
        let before = totals(&sub.recv().await.unwrap().records::<Station>());

        for _ in 0..10 {
            feed.tick().unwrap();
        }
        let mut sub = store
            .subscribe(&StorePath::inventory_items(), SubscribeOptions::all())
            .unwrap();
        let after = totals(&sub.recv().await.unwrap().records::<Station>());

        assert_eq!(before, after);
    }

    #[test]
    fn test_rider_stays_in_the_city() {
        let store = MemoryStore::new();
        let mut feed = DemoFeed::with_seed(store, &session(), 3);

        for _ in 0..300 {
            feed.tick().unwrap();
            let LatLng { lat, lon } = feed.rider;
            assert!((53.31..53.37).contains(&lat), "latitude {lat} left the city");
            assert!((-6.31..-6.22).contains(&lon), "longitude {lon} left the city");
        }
    }

    #[tokio::test]
    async fn test_telemetry_tracks_nearest_dock() {
        let store = MemoryStore::new();
        let mut feed = DemoFeed::with_seed(store.clone(), &session(), 5);
        feed.tick().unwrap();

        // One step from the starting dock, so it must still be nearest.
        let mut sub = store
            .subscribe(
                &StorePath::telemetry_latest(&session()),
                SubscribeOptions::all(),
            )
            .unwrap();
        let sample: TelemetrySample = sub.recv().await.unwrap().latest().unwrap();
        assert_eq!(sample.nearest_station_name, "Portobello Harbour");
        assert!(sample.nearest_dist_m < 100.0);
        assert!(sample.nearest_walk_eta_s > 0.0);
    }

    #[tokio::test]
    async fn test_recommendations_exclude_nearest_and_rank_by_score() {
        let store = MemoryStore::new();
        let mut feed = DemoFeed::with_seed(store.clone(), &session(), 9);
        feed.tick().unwrap();

        let mut sub = store
            .subscribe(
                &StorePath::recommendations(&session()),
                SubscribeOptions::all(),
            )
            .unwrap();
        let set: RecommendationSet = sub.recv().await.unwrap().latest().unwrap();

        assert_eq!(set.items.len(), 5);
        assert!(set.items.iter().all(|r| r.name != "Portobello Harbour"));
        for pair in set.items.windows(2) {
            assert!(
                pair[0].score >= pair[1].score,
                "items out of order: {} < {}",
                pair[0].score,
                pair[1].score
            );
        }
    }

    #[test]
    fn test_meters_between_is_plausible() {
        // Portobello Harbour to Smithfield North is roughly 2.3 km.
        let a = LatLng::new(53.3304, -6.2635);
        let b = LatLng::new(53.3497, -6.2781);
        let dist = meters_between(a, b);
        assert!(
            (2000.0..2800.0).contains(&dist),
            "distance {dist} outside the expected band"
        );
    }
}
