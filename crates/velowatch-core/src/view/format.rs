//! Human-readable quantity formatting
//!
//! Overlay text shows whole metres and whole minutes; the raw telemetry
//! precision is noise at map scale.

/// Format a distance in metres, e.g. `"215 m"`.
pub fn format_distance_m(meters: f64) -> String {
    format!("{} m", meters.round() as i64)
}

/// Format a walking duration given in seconds as whole minutes,
/// e.g. `"3 min"`.
pub fn format_eta_min(seconds: f64) -> String {
    format!("{} min", (seconds / 60.0).round() as i64)
}
