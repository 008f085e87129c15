//! Settings schema with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TeachLabSettings {
    /// HTTP request/response endpoint settings.
    pub api: ApiSettings,
    /// Session WebSocket settings.
    pub stream: StreamSettings,
}

impl Default for TeachLabSettings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

/// HTTP endpoint configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL of the session server's REST surface.
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
        }
    }
}

/// WebSocket endpoint and reconnect behavior.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSettings {
    /// WebSocket endpoint; the session id is appended as a path segment.
    pub url: String,
    /// Fixed delay between reconnect attempts, in milliseconds.
    ///
    /// The reconnect loop retries indefinitely at this interval; there is no
    /// backoff or attempt cap.
    pub reconnect_delay_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8000/ws".into(),
            reconnect_delay_ms: 2000,
        }
    }
}
