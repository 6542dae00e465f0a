//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold tunables for storage, autosave and history with working defaults.
//! - Read overrides from a JSON document or `MARKNOTE_*` environment
//!   variables.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - Unparseable environment values are ignored with a warning.

use crate::repo::note_repo::NOTES_KEY;
use crate::service::autosave::{DEFAULT_AUTOSAVE_DELAY, DEFAULT_STATUS_DISPLAY};
use crate::service::history::{HistoryScope, DEFAULT_HISTORY_LIMIT};
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default metadata quota, matching typical browser local storage.
pub const DEFAULT_METADATA_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

const METADATA_DB_FILE_NAME: &str = "marknote_meta.sqlite3";
const IMAGE_DB_FILE_NAME: &str = "marknote_images.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory holding both databases. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub metadata_quota_bytes: u64,
    pub notes_key: String,
    pub autosave_debounce_ms: u64,
    pub status_display_ms: u64,
    pub history_limit: usize,
    pub history_scope: HistoryScope,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            metadata_quota_bytes: DEFAULT_METADATA_QUOTA_BYTES,
            notes_key: NOTES_KEY.to_string(),
            autosave_debounce_ms: DEFAULT_AUTOSAVE_DELAY.as_millis() as u64,
            status_display_ms: DEFAULT_STATUS_DISPLAY.as_millis() as u64,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_scope: HistoryScope::default(),
        }
    }
}

impl CoreConfig {
    /// In-memory configuration with defaults.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// On-disk configuration rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
            ..Self::default()
        }
    }

    /// Parses a JSON config document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden through an arbitrary variable lookup.
    ///
    /// Recognized keys: `MARKNOTE_DATA_DIR`, `MARKNOTE_QUOTA_BYTES`,
    /// `MARKNOTE_AUTOSAVE_MS`, `MARKNOTE_STATUS_MS`, `MARKNOTE_HISTORY_LIMIT`,
    /// `MARKNOTE_HISTORY_SCOPE` (`global` | `per_note`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup("MARKNOTE_DATA_DIR").filter(|dir| !dir.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = parse_var(&lookup, "MARKNOTE_QUOTA_BYTES") {
            config.metadata_quota_bytes = value;
        }
        if let Some(value) = parse_var(&lookup, "MARKNOTE_AUTOSAVE_MS") {
            config.autosave_debounce_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "MARKNOTE_STATUS_MS") {
            config.status_display_ms = value;
        }
        if let Some(value) = parse_var(&lookup, "MARKNOTE_HISTORY_LIMIT") {
            config.history_limit = value;
        }
        if let Some(raw) = lookup("MARKNOTE_HISTORY_SCOPE") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "global" => config.history_scope = HistoryScope::Global,
                "per_note" | "per-note" => config.history_scope = HistoryScope::PerNote,
                other => warn!(
                    "event=config_env module=config status=ignored key=MARKNOTE_HISTORY_SCOPE value={other}"
                ),
            }
        }
        config
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    pub fn status_display(&self) -> Duration {
        Duration::from_millis(self.status_display_ms)
    }

    pub fn metadata_db_path(&self) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(METADATA_DB_FILE_NAME))
    }

    pub fn image_db_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(IMAGE_DB_FILE_NAME))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("event=config_env module=config status=ignored key={key} value={raw}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CoreConfig;
    use crate::service::history::HistoryScope;
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn empty_json_yields_defaults() {
        let config = CoreConfig::from_json("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.autosave_debounce_ms, 400);
        assert_eq!(config.status_display_ms, 2000);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.notes_key, "notes");
    }

    #[test]
    fn json_overrides_selected_fields() {
        let config =
            CoreConfig::from_json(r#"{"history_scope":"global","autosave_debounce_ms":250}"#)
                .unwrap();
        assert_eq!(config.history_scope, HistoryScope::Global);
        assert_eq!(config.autosave_debounce_ms, 250);
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn env_lookup_applies_valid_values_and_skips_invalid_ones() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MARKNOTE_DATA_DIR", "/tmp/marknote"),
            ("MARKNOTE_QUOTA_BYTES", "1024"),
            ("MARKNOTE_AUTOSAVE_MS", "not-a-number"),
            ("MARKNOTE_HISTORY_SCOPE", "GLOBAL"),
        ]);
        let config = CoreConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/marknote")));
        assert_eq!(config.metadata_quota_bytes, 1024);
        assert_eq!(config.autosave_debounce_ms, 400);
        assert_eq!(config.history_scope, HistoryScope::Global);
        assert!(config
            .metadata_db_path()
            .unwrap()
            .ends_with("marknote_meta.sqlite3"));
    }
}
