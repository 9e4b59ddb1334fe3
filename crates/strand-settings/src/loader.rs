//! Layered settings: compiled defaults, then `~/.strand/settings.json`, then
//! `STRAND_*` environment variables.
//!
//! The file is merged over the defaults as JSON before deserializing, so a
//! file only needs the keys it changes. Objects merge key by key, arrays and
//! scalars replace, and an explicit `null` leaves the default in place.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::StrandSettings;

/// `~/.strand/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".strand")
        .join("settings.json")
}

/// All three layers, reading the file from [`settings_path`].
pub fn load_settings() -> Result<StrandSettings> {
    load_settings_from_path(&settings_path())
}

/// All three layers with an explicit file. A missing file is not an error.
pub fn load_settings_from_path(path: &Path) -> Result<StrandSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the settings file merged over them, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<StrandSettings> {
    let defaults = serde_json::to_value(StrandSettings::default())?;

    let merged = if path.exists() {
        debug!(path = %path.display(), "merging settings file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(path = %path.display(), "no settings file");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Merge `overlay` into `base`. See the module docs for the rules.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `STRAND_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut StrandSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; booleans accept
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`. Invalid values are
/// warned about and ignored.
pub fn apply_overrides(settings: &mut StrandSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = EnvReader { lookup };

    // ── API ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("STRAND_API_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = env.string("STRAND_CHAT_PATH") {
        settings.api.chat_path = v;
    }
    if let Some(v) = env.number("STRAND_REQUEST_TIMEOUT_MS", 0, 3_600_000) {
        settings.api.request_timeout_ms = v;
    }

    // ── Side channel ────────────────────────────────────────────────
    if let Some(v) = env.string("STRAND_WS_URL") {
        settings.websocket.base_url = v;
    }
    if let Some(v) = env.number("STRAND_WS_PING_INTERVAL_MS", 1000, 600_000) {
        settings.websocket.ping_interval_ms = v;
    }
    if let Some(v) = env.number("STRAND_WS_PONG_TIMEOUT_MS", 1000, 600_000) {
        settings.websocket.pong_timeout_ms = v;
    }
    if let Some(v) = env.number("STRAND_WS_MAX_RECONNECT_ATTEMPTS", 0, 1000) {
        settings.websocket.max_reconnect_attempts = v;
    }
    if let Some(v) = env.number("STRAND_WS_INITIAL_DELAY_MS", 1, 600_000) {
        settings.websocket.initial_reconnect_delay_ms = v;
    }
    if let Some(v) = env.number("STRAND_WS_MAX_DELAY_MS", 1, 3_600_000) {
        settings.websocket.max_reconnect_delay_ms = v;
    }
    if let Some(v) = env.number("STRAND_WS_MAX_QUEUE", 1, 100_000) {
        settings.websocket.max_queue_size = v;
    }

    // ── Identity / logging ──────────────────────────────────────────
    if let Some(v) = env.string("STRAND_USER_ID") {
        settings.identity.user_id = v;
    }
    if let Some(v) = env.string("STRAND_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("STRAND_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSE: [&str; 4] = ["false", "0", "no", "off"];
    if TRUE.iter().any(|t| val.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSE.iter().any(|f| val.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}

/// A number in `min..=max`.
pub fn parse_in_range<T: FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    val.parse::<T>().ok().filter(|n| (min..=max).contains(n))
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn parsed<T>(&self, name: &str, kind: &str, parse: impl FnOnce(&str) -> Option<T>) -> Option<T> {
        let val = (self.lookup)(name)?;
        let parsed = parse(&val);
        if parsed.is_none() {
            warn!(key = name, value = %val, expected = kind, "ignoring invalid override");
        }
        parsed
    }

    fn bool(&self, name: &str) -> Option<bool> {
        self.parsed(name, "bool", parse_bool)
    }

    fn number<T: FromStr + PartialOrd>(&self, name: &str, min: T, max: T) -> Option<T> {
        self.parsed(name, "number", |v| parse_in_range(v, min, max))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
