//! Reconnection policy: pure backoff and retry decisions.

use std::time::Duration;

use crate::config::ReconnectConfig;
use crate::transport::CloseReason;

/// Deterministic, side-effect-free reconnection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    /// Automatic retries allowed before a session is considered failed.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Build a policy from explicit knobs.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay_ms: u64::try_from(base_delay.as_millis()).unwrap_or(u64::MAX),
            max_delay_ms: u64::try_from(max_delay.as_millis()).unwrap_or(u64::MAX),
            max_attempts,
        }
    }

    /// Build a policy from the reconnect config section.
    #[must_use]
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_attempts: config.max_attempts,
        }
    }

    /// Whether a close with `reason` should be retried at all.
    ///
    /// A logout permanently invalidates credentials; every other reason is
    /// worth retrying.
    #[must_use]
    pub fn should_retry(reason: &CloseReason) -> bool {
        !reason.is_logged_out()
    }

    /// Backoff delay before retry number `attempts`.
    ///
    /// `min(base * 2^attempts, cap)` — monotonically non-decreasing and
    /// saturating at the cap.
    #[must_use]
    pub fn delay(&self, attempts: u32) -> Duration {
        let factor = 1u64.checked_shl(attempts).unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Whether `attempts` has consumed the automatic retry budget.
    #[must_use]
    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
