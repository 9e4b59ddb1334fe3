//! Side-channel connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strand_core::retry::{
    BackoffConfig, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
};
use url::Url;

use crate::errors::{Result, SettingsError};

/// Heartbeat, reconnect and queue tuning for the side channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Socket base URL. Empty means "derive from the API base URL".
    pub base_url: String,
    /// Interval between `system.ping` heartbeats.
    pub ping_interval_ms: u64,
    /// Time allowed for a `system.pong` before the socket is recycled.
    pub pong_timeout_ms: u64,
    /// Reconnect attempts before settling in `disconnected`.
    pub max_reconnect_attempts: u32,
    /// First reconnect delay.
    pub initial_reconnect_delay_ms: u64,
    /// Reconnect delay cap.
    pub max_reconnect_delay_ms: u64,
    /// Offline queue capacity; the oldest entry is dropped when full.
    pub max_queue_size: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000".to_string(),
            ping_interval_ms: 30_000,
            pong_timeout_ms: 10_000,
            max_reconnect_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_reconnect_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_queue_size: 100,
        }
    }
}

impl WebSocketSettings {
    /// Heartbeat interval.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Pong deadline.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    /// Reconnect policy.
    pub fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            max_attempts: self.max_reconnect_attempts,
            initial_delay_ms: self.initial_reconnect_delay_ms,
            max_delay_ms: self.max_reconnect_delay_ms,
        }
    }
}

/// Derive a socket base URL from an HTTP API URL.
///
/// `http` maps to `ws` and `https` to `wss`; host and port are kept, path
/// and query are dropped.
pub fn derive_ws_base(api_base: &str) -> Result<String> {
    let mut url = Url::parse(api_base)
        .map_err(|e| SettingsError::InvalidValue(format!("api.baseUrl {api_base:?}: {e}")))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SettingsError::InvalidValue(format!(
                "api.baseUrl: unsupported scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| SettingsError::InvalidValue(format!("cannot map {api_base:?} to {scheme}")))?;
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.as_str().trim_end_matches('/').to_string())
}
