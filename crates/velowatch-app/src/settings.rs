//! Persisted application settings.
//!
//! Settings live in a small JSON file under the platform data directory
//! (for example `~/.local/share/VeloWatch/settings.json` on Linux).
//! Loading is tolerant: a missing or unreadable file yields defaults,
//! and save failures are ignored so a read-only home directory never
//! prevents the map from starting.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Base URL of the availability store, e.g. `https://bikes.example.com`.
    pub store_url: Option<String>,
    /// Session identifier from the previous run.
    pub session: Option<String>,
    /// Trail window size override.
    pub trail_limit: Option<usize>,
}

/// Get the VeloWatch app data directory (cross-platform)
fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("VeloWatch")
}

/// Path of the persisted settings file.
pub fn settings_path() -> PathBuf {
    app_data_dir().join("settings.json")
}

/// Load settings, falling back to defaults when the file is missing or corrupt.
pub fn load() -> Settings {
    load_from(&settings_path())
}

/// Persist settings. Failures are swallowed; settings are a convenience,
/// not required state.
pub fn save(settings: &Settings) {
    save_to(&settings_path(), settings);
}

fn load_from(path: &Path) -> Settings {
    if let Ok(content) = std::fs::read_to_string(path) {
        if let Ok(settings) = serde_json::from_str(&content) {
            return settings;
        }
    }
    Settings::default()
}

fn save_to(path: &Path, settings: &Settings) {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(json) = serde_json::to_string_pretty(settings) {
        let _ = std::fs::write(path, json);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        assert_eq!(load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            store_url: Some("https://bikes.example.com".to_string()),
            session: Some("ride-42".to_string()),
            trail_limit: Some(250),
        };
        save_to(&path, &settings);
        assert_eq!(load_from(&path), settings);
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_from(&path), Settings::default());
    }

    #[test]
    fn test_load_tolerates_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"session":"ride-7"}"#).unwrap();
        let settings = load_from(&path);
        assert_eq!(settings.session.as_deref(), Some("ride-7"));
        assert_eq!(settings.store_url, None);
    }
}
