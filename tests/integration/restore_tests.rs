//! Integration tests for restore-on-startup.
//!
//! The restorer enumerates credential directories and reconnects each
//! candidate in the background; directories without a credential file are
//! skipped and individual failures never halt the pass.

use std::time::Duration;

use chatwarden::persistence::creds::CredentialMaterial;
use chatwarden::supervisor::restore::spawn_restore;

use super::test_helpers::{harness, wait_until};

#[tokio::test]
async fn restores_every_session_with_a_credential_file() {
    let h = harness();
    h.creds
        .store("alpha", &CredentialMaterial::paired("111".into()))
        .expect("seed alpha");
    h.creds
        .store("beta", &CredentialMaterial::paired("222".into()))
        .expect("seed beta");
    // A bare directory is not a candidate.
    h.creds.ensure_session_dir("stray").expect("stray dir");

    let restore = spawn_restore(h.supervisor.clone(), Duration::from_millis(10));
    tokio::time::timeout(Duration::from_secs(5), restore)
        .await
        .expect("restore pass completes")
        .expect("restore task");

    assert_eq!(h.transport.open_calls(), 2, "one open per candidate");
    assert!(h.registry.peek("alpha").is_some());
    assert!(h.registry.peek("beta").is_some());
    assert!(
        h.registry.peek("stray").is_none(),
        "directories without credentials are not restored"
    );
}

#[tokio::test]
async fn restore_with_an_empty_root_is_a_quiet_noop() {
    let h = harness();
    let restore = spawn_restore(h.supervisor.clone(), Duration::from_millis(10));
    tokio::time::timeout(Duration::from_secs(2), restore)
        .await
        .expect("restore pass completes")
        .expect("restore task");
    assert_eq!(h.transport.open_calls(), 0);
}

#[tokio::test]
async fn one_failing_candidate_does_not_halt_the_pass() {
    let h = harness();
    h.creds
        .store("alpha", &CredentialMaterial::paired("111".into()))
        .expect("seed alpha");
    h.creds
        .store("beta", &CredentialMaterial::paired("222".into()))
        .expect("seed beta");

    // First open (alphabetically: alpha) fails; the pass must continue.
    h.transport.fail_next_open();

    let restore = spawn_restore(h.supervisor.clone(), Duration::from_millis(10));
    tokio::time::timeout(Duration::from_secs(5), restore)
        .await
        .expect("restore pass completes")
        .expect("restore task");

    assert!(
        h.registry.peek("beta").is_some(),
        "the second candidate must still be restored"
    );
    // alpha's failed open schedules a backoff retry on top of the two
    // restore-driven opens.
    assert!(
        wait_until(Duration::from_secs(2), || h.transport.open_calls() >= 2).await
    );
}
