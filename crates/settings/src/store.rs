//! Persistence of the last-used settings.
//!
//! Settings are stored in a small JSON document keyed by [`SETTINGS_KEY`],
//! so the same file can hold other entries without clobbering them.
//! Loading never fails: a missing, unreadable or corrupt store yields the
//! defaults.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use vidfx_common::error::VidfxResult;

use crate::ingest::ingest_value;
use crate::settings::Settings;

/// Fixed identifier under which the last-used settings are stored.
pub const SETTINGS_KEY: &str = "vidfx.settings.v1";

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Create a store backed by the given JSON file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted settings, falling back to defaults.
    ///
    /// Individual fields with a wrong type fall back on their own; the
    /// rest of the stored value is kept.
    pub fn load(&self) -> Settings {
        let Some(document) = self.read_document() else {
            return Settings::default();
        };
        let Some(entry) = document.get(SETTINGS_KEY) else {
            return Settings::default();
        };
        match ingest_value(entry) {
            Ok(ingested) => {
                if ingested.is_partial() {
                    tracing::warn!(
                        path = %self.path.display(),
                        rejected = ?ingested.rejected,
                        "Persisted settings had invalid fields; using defaults for them"
                    );
                }
                ingested.settings
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring persisted settings");
                Settings::default()
            }
        }
    }

    /// Persist `settings` under [`SETTINGS_KEY`], keeping other entries.
    pub fn save(&self, settings: &Settings) -> VidfxResult<()> {
        let mut document = self.read_document().unwrap_or_default();
        document.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);
        self.write_document(&document)
    }

    /// Remove the persisted settings entry.
    pub fn clear(&self) -> VidfxResult<()> {
        let Some(mut document) = self.read_document() else {
            return Ok(());
        };
        if document.remove(SETTINGS_KEY).is_some() {
            self.write_document(&document)?;
        }
        Ok(())
    }

    fn read_document(&self) -> Option<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read settings store");
                return None;
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(document)) => Some(document),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "Settings store is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Settings store is corrupt");
                None
            }
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> VidfxResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_store_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("a").join("settings.json"));
        let settings = Settings {
            brightness: 150.0,
            enable_pixel_noise: true,
            ..Settings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn test_corrupt_store_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{{{").unwrap();
        let store = SettingsStore::new(&path);
        assert_eq!(store.load(), Settings::default());

        // Saving over a corrupt file replaces it.
        store.save(&Settings::default()).unwrap();
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_save_keeps_unrelated_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"other.key": 7}"#).unwrap();
        let store = SettingsStore::new(&path);
        store.save(&Settings::default()).unwrap();

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["other.key"], 7);
        assert!(raw.get(SETTINGS_KEY).is_some());
    }

    #[test]
    fn test_clear_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store
            .save(&Settings {
                volume: 10.0,
                ..Settings::default()
            })
            .unwrap();
        store.clear().unwrap();
        assert_eq!(store.load(), Settings::default());
    }
}
