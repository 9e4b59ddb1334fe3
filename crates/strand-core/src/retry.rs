//! Reconnect backoff configuration and delay calculation.
//!
//! The side channel reconnects with pure exponential backoff:
//! `delay = min(initial * 2^attempt, max)`. The async scheduling lives in
//! `strand-client`; this module holds the portable arithmetic.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default initial delay in milliseconds.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Reconnect backoff parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    /// Attempts allowed before giving up (default: 10).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first reconnect in ms (default: 1000).
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl BackoffConfig {
    /// Delay to wait before reconnect attempt number `attempt` (zero-based).
    ///
    /// Returns `None` once `attempt` reaches `max_attempts`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| {
            Duration::from_millis(calculate_backoff_delay(
                attempt,
                self.initial_delay_ms,
                self.max_delay_ms,
            ))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate exponential backoff delay.
///
/// Formula: `min(max_delay, initial_delay * 2^attempt)`. The shift is
/// clamped and the multiplication saturates, so large attempt counts settle
/// at `max_delay_ms`.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, initial_delay_ms: u64, max_delay_ms: u64) -> u64 {
    let exponential = initial_delay_ms.saturating_mul(1u64 << attempt.min(31));
    exponential.min(max_delay_ms)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn doubles_each_attempt() {
        assert_eq!(calculate_backoff_delay(0, 1000, 30_000), 1000);
        assert_eq!(calculate_backoff_delay(1, 1000, 30_000), 2000);
        assert_eq!(calculate_backoff_delay(2, 1000, 30_000), 4000);
        assert_eq!(calculate_backoff_delay(4, 1000, 30_000), 16_000);
    }

    #[test]
    fn capped_at_max() {
        assert_eq!(calculate_backoff_delay(5, 1000, 30_000), 30_000);
        assert_eq!(calculate_backoff_delay(200, 1000, 30_000), 30_000);
    }

    #[test]
    fn delay_for_stops_at_max_attempts() {
        let config = BackoffConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(config.delay_for(0), Some(Duration::from_millis(100)));
        assert_eq!(config.delay_for(2), Some(Duration::from_millis(400)));
        assert_eq!(config.delay_for(3), None);
    }

    #[test]
    fn config_defaults_from_empty_json() {
        let config: BackoffConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BackoffConfig::default());
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.initial_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
    }

    proptest! {
        #[test]
        fn never_exceeds_max(attempt in 0u32..100, initial in 1u64..10_000, max in 1u64..120_000) {
            prop_assert!(calculate_backoff_delay(attempt, initial, max) <= max);
        }

        #[test]
        fn monotonic_in_attempt(attempt in 0u32..60, initial in 1u64..10_000, max in 1u64..120_000) {
            let a = calculate_backoff_delay(attempt, initial, max);
            let b = calculate_backoff_delay(attempt + 1, initial, max);
            prop_assert!(b >= a);
        }
    }
}
