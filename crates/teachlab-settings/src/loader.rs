//! Settings loading: defaults → file deep-merge → env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TeachLabSettings;

/// Path of the user settings file (`~/.teachlab/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".teachlab")
        .join("settings.json")
}

/// Deep-merge `overlay` into `base`.
///
/// Objects merge key-by-key recursively; any other value in the overlay
/// (including null) replaces the base value wholesale.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error: defaults are used.
pub fn load_settings() -> Result<TeachLabSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env overrides applied.
pub fn load_settings_from_path(path: &Path) -> Result<TeachLabSettings> {
    let defaults = serde_json::to_value(TeachLabSettings::default())?;
    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        debug!(?path, "merging settings file over defaults");
        deep_merge(defaults, file_value)
    } else {
        defaults
    };
    let mut settings: TeachLabSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Apply `TEACHLAB_*` environment variable overrides (highest priority).
fn apply_env_overrides(settings: &mut TeachLabSettings) {
    if let Ok(url) = std::env::var("TEACHLAB_API_URL") {
        settings.api.base_url = url;
    }
    if let Ok(url) = std::env::var("TEACHLAB_WS_URL") {
        settings.stream.url = url;
    }
    if let Ok(delay) = std::env::var("TEACHLAB_RECONNECT_DELAY_MS") {
        match delay.parse() {
            Ok(ms) => settings.stream.reconnect_delay_ms = ms,
            Err(_) => {
                tracing::warn!(value = %delay, "TEACHLAB_RECONNECT_DELAY_MS is not a number, ignoring");
            }
        }
    }
}
