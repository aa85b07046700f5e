//! Unit tests for the pure reconnection policy.
//!
//! Validates the backoff schedule (monotonic, saturating at the cap), the
//! retry decision per close reason, and budget exhaustion.

use std::time::Duration;

use chatwarden::config::ReconnectConfig;
use chatwarden::supervisor::backoff::ReconnectPolicy;
use chatwarden::transport::CloseReason;

fn default_policy() -> ReconnectPolicy {
    ReconnectPolicy::new(Duration::from_millis(3000), Duration::from_millis(30_000), 5)
}

#[test]
fn delay_doubles_from_base() {
    let policy = default_policy();
    assert_eq!(policy.delay(0), Duration::from_millis(3000));
    assert_eq!(policy.delay(1), Duration::from_millis(6000));
    assert_eq!(policy.delay(2), Duration::from_millis(12_000));
    assert_eq!(policy.delay(3), Duration::from_millis(24_000));
}

#[test]
fn delay_saturates_at_cap() {
    let policy = default_policy();
    assert_eq!(policy.delay(4), Duration::from_millis(30_000));
    assert_eq!(policy.delay(10), Duration::from_millis(30_000));
    assert_eq!(policy.delay(63), Duration::from_millis(30_000));
    // Shift widths past the integer size must not wrap around.
    assert_eq!(policy.delay(u32::MAX), Duration::from_millis(30_000));
}

#[test]
fn delay_is_monotonically_non_decreasing() {
    let policy = default_policy();
    let mut previous = Duration::ZERO;
    for attempts in 0..64 {
        let delay = policy.delay(attempts);
        assert!(
            delay >= previous,
            "delay({attempts}) = {delay:?} dipped below {previous:?}"
        );
        previous = delay;
    }
}

#[test]
fn logout_is_never_retried() {
    assert!(!ReconnectPolicy::should_retry(&CloseReason::LoggedOut));
}

#[test]
fn transient_closes_are_retried() {
    assert!(ReconnectPolicy::should_retry(&CloseReason::ConnectionLost));
    assert!(ReconnectPolicy::should_retry(&CloseReason::Replaced));
    assert!(ReconnectPolicy::should_retry(&CloseReason::StreamError(
        "mux desync".into()
    )));
}

#[test]
fn budget_exhaustion_boundary() {
    let policy = default_policy();
    assert!(!policy.exhausted(0));
    assert!(!policy.exhausted(4));
    assert!(policy.exhausted(5));
    assert!(policy.exhausted(6));
}

#[test]
fn policy_from_config_uses_config_knobs() {
    let config = ReconnectConfig {
        base_delay_ms: 100,
        max_delay_ms: 250,
        max_attempts: 2,
    };
    let policy = ReconnectPolicy::from_config(&config);
    assert_eq!(policy.delay(0), Duration::from_millis(100));
    assert_eq!(policy.delay(1), Duration::from_millis(200));
    assert_eq!(policy.delay(2), Duration::from_millis(250));
    assert!(policy.exhausted(2));
}
