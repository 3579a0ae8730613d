//! Store path addressing
//!
//! Paths name nodes in the store's key hierarchy, written `/a/b/c`. The
//! store rejects keys containing `. # $ [ ]`, so validation happens here
//! once and the rest of the crate passes [`StorePath`] values around
//! without re-checking.

use std::fmt;

use super::StoreError;
use crate::session::SessionId;

/// Characters the store does not allow in keys.
const FORBIDDEN_CHARS: &[char] = &['.', '#', '$', '[', ']'];

/// Validated, canonical store path.
///
/// Canonical form has a leading slash, no trailing slash, and at least one
/// segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath(String);

impl StorePath {
    /// Parse and canonicalize a raw path.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let stripped = raw.trim().trim_matches('/');
        if stripped.is_empty() {
            return Err(invalid("path has no segments"));
        }

        let mut segments = Vec::new();
        for segment in stripped.split('/') {
            if segment.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if let Some(bad) = segment.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
                return Err(StoreError::InvalidPath {
                    path: raw.to_string(),
                    reason: format!("segment '{segment}' contains forbidden character '{bad}'"),
                });
            }
            segments.push(segment);
        }

        Ok(Self::from_segments(&segments))
    }

    /// The station inventory collection.
    pub fn inventory_items() -> Self {
        Self::from_segments(&["inventory", "items"])
    }

    /// Telemetry samples for one session.
    pub fn telemetry_latest(session: &SessionId) -> Self {
        Self::from_segments(&["analytics", "latest", session.as_str()])
    }

    /// Recommendation batches for one session.
    pub fn recommendations(session: &SessionId) -> Self {
        Self::from_segments(&["analytics", "recommendations", session.as_str()])
    }

    /// Movement trail points for one session.
    pub fn trail_points(session: &SessionId) -> Self {
        Self::from_segments(&["sessions", session.as_str(), "points"])
    }

    /// The canonical path string, always starting with `/`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Segments must already satisfy the key rules.
    fn from_segments(segments: &[&str]) -> Self {
        Self(format!("/{}", segments.join("/")))
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
