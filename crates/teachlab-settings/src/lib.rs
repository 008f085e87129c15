//! # teachlab-settings
//!
//! Configuration management with layered sources for the TeachLab client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`TeachLabSettings::default()`]
//! 2. **User file** — `~/.teachlab/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `TEACHLAB_*` overrides (highest priority)
//!
//! Components take a settings value through their constructors; the global
//! accessor exists for the CLI entry point and is reloadable.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// `RwLock<Option<Arc<..>>>` rather than `OnceLock` so the cached value can
/// be swapped by [`reload_settings_from_path`]. Reads are a shared lock plus
/// an `Arc::clone`.
static SETTINGS: RwLock<Option<Arc<TeachLabSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// Loads from disk on first access; returns compiled defaults if loading
/// fails. Returns an `Arc` so callers hold a consistent snapshot across a
/// concurrent reload.
pub fn get_settings() -> Arc<TeachLabSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Another thread may have initialized while we waited for the write lock
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            TeachLabSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
///
/// Replaces any previously cached settings.
pub fn init_settings(settings: TeachLabSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Reload settings from a specific file path and swap the global cache.
pub fn reload_settings_from_path(path: &Path) {
    let new = Arc::new(match load_settings_from_path(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, ?path, "failed to reload settings, falling back to defaults");
            TeachLabSettings::default()
        }
    });
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(new);
    tracing::info!(?path, "settings reloaded from disk");
}

#[cfg(test)]
pub(crate) fn reset_settings() {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tests that mutate the global SETTINGS static must hold this lock
    /// to avoid racing with each other.
    static SETTINGS_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn init_settings_sets_custom_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        let mut custom = TeachLabSettings::default();
        custom.stream.reconnect_delay_ms = 9999;
        init_settings(custom);
        assert_eq!(get_settings().stream.reconnect_delay_ms, 9999);
        reset_settings();
    }

    #[test]
    fn reload_settings_from_path_updates_cached_value() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(TeachLabSettings::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"stream": {"reconnectDelayMs": 750}}"#).unwrap();

        reload_settings_from_path(&path);

        let updated = get_settings();
        assert_eq!(updated.stream.reconnect_delay_ms, 750);
        // Deep merge preserves untouched defaults
        assert_eq!(updated.api.base_url, "http://localhost:8000");
        reset_settings();
    }

    #[test]
    fn snapshot_isolated_from_reload() {
        let _lock = SETTINGS_MUTEX.lock().unwrap();
        reset_settings();
        init_settings(TeachLabSettings::default());

        let snapshot = get_settings();
        let mut new = TeachLabSettings::default();
        new.stream.reconnect_delay_ms = 5;
        init_settings(new);

        assert_eq!(snapshot.stream.reconnect_delay_ms, 2000);
        assert_eq!(get_settings().stream.reconnect_delay_ms, 5);
        reset_settings();
    }
}
