//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a partial JSON file only needs the keys it changes.

mod api;
mod websocket;

pub use api::*;
pub use websocket::*;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Root settings type.
///
/// ```json
/// {
///   "api": { "baseUrl": "https://agent.example.com/api/v1" },
///   "websocket": { "pingIntervalMs": 15000 },
///   "identity": { "userId": "u-42" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrandSettings {
    /// Turn endpoint.
    pub api: ApiSettings,
    /// Side channel.
    pub websocket: WebSocketSettings,
    /// Who is talking.
    pub identity: IdentitySettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl StrandSettings {
    /// Socket base URL, derived from the API base when left empty.
    pub fn ws_base_url(&self) -> Result<String> {
        if self.websocket.base_url.is_empty() {
            derive_ws_base(&self.api.base_url)
        } else {
            Ok(self.websocket.base_url.trim_end_matches('/').to_string())
        }
    }
}

/// User identity sent with turn requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IdentitySettings {
    /// User id.
    pub user_id: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}
