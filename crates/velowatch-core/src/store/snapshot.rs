//! Whole-value snapshots
//!
//! The store delivers the entire value at a subscribed path on every
//! change. Collections arrive as one JSON object keyed by chronologically
//! sortable push keys, so ascending key order is insertion order.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::StorePath;

/// The complete value at one path at one moment.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Path the snapshot was taken at
    pub path: StorePath,
    /// Value at the path; `None` when the path holds nothing
    pub value: Option<Value>,
}

impl Snapshot {
    /// Create a snapshot.
    pub fn new(path: StorePath, value: Option<Value>) -> Self {
        Self { path, value }
    }

    /// Decode the snapshot as an ordered collection of records.
    ///
    /// Records come back in ascending key order, oldest first. Malformed
    /// records are logged and skipped rather than failing the whole
    /// snapshot; one bad producer write must not blank the map.
    pub fn records<T: DeserializeOwned>(&self) -> Vec<T> {
        match &self.value {
            None => Vec::new(),
            Some(Value::Object(map)) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                entries
                    .into_iter()
                    .filter_map(|(key, value)| self.decode(key, value))
                    .collect()
            }
            // The store's REST surface renders integer-keyed collections
            // as arrays, with null holes for missing indices.
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter(|(_, value)| !value.is_null())
                .filter_map(|(index, value)| self.decode(&index.to_string(), value))
                .collect(),
            Some(other) => {
                tracing::warn!(
                    path = %self.path,
                    kind = value_kind(other),
                    "expected a keyed collection, ignoring value"
                );
                Vec::new()
            }
        }
    }

    /// Decode only the newest record in the collection.
    pub fn latest<T: DeserializeOwned>(&self) -> Option<T> {
        self.records().pop()
    }

    fn decode<T: DeserializeOwned>(&self, key: &str, value: &Value) -> Option<T> {
        match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::warn!(path = %self.path, key, %error, "skipping malformed record");
                None
            }
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrailPoint;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn trail_path() -> StorePath {
        StorePath::parse("/sessions/test/points").unwrap()
    }

    #[test]
    fn test_records_in_key_order() {
        let snapshot = Snapshot::new(
            trail_path(),
            Some(json!({
                "k002": { "latitude": 2.0, "longitude": 2.0 },
                "k000": { "latitude": 0.0, "longitude": 0.0 },
                "k001": { "latitude": 1.0, "longitude": 1.0 }
            })),
        );

        let points: Vec<TrailPoint> = snapshot.records();
        let lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
        assert_eq!(lats, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_empty_path_yields_no_records() {
        let snapshot = Snapshot::new(trail_path(), None);
        let points: Vec<TrailPoint> = snapshot.records();
        assert!(points.is_empty());
    }

    #[test]
    fn test_malformed_record_is_skipped() {
        let snapshot = Snapshot::new(
            trail_path(),
            Some(json!({
                "k000": { "latitude": 0.0, "longitude": 0.0 },
                "k001": { "latitude": "not a number" },
                "k002": { "latitude": 2.0, "longitude": 2.0 }
            })),
        );

        let points: Vec<TrailPoint> = snapshot.records();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].latitude, 2.0);
    }

    #[test]
    fn test_array_rendering_with_null_holes() {
        let snapshot = Snapshot::new(
            trail_path(),
            Some(json!([
                { "latitude": 0.0, "longitude": 0.0 },
                null,
                { "latitude": 2.0, "longitude": 2.0 }
            ])),
        );

        let points: Vec<TrailPoint> = snapshot.records();
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_scalar_value_yields_no_records() {
        let snapshot = Snapshot::new(trail_path(), Some(json!(42)));
        let points: Vec<TrailPoint> = snapshot.records();
        assert!(points.is_empty());
    }

    #[test]
    fn test_latest_returns_newest() {
        let snapshot = Snapshot::new(
            trail_path(),
            Some(json!({
                "k000": { "latitude": 0.0, "longitude": 0.0 },
                "k001": { "latitude": 1.0, "longitude": 1.0 }
            })),
        );

        let latest: Option<TrailPoint> = snapshot.latest();
        assert_eq!(latest.map(|p| p.latitude), Some(1.0));
    }
}
