//! Integration tests for session deletion.
//!
//! Validates:
//! - the reserved id being refused regardless of state
//! - deletion removing both the registry record and the credential directory
//! - pending reconnect timers being cancelled so a deleted session can
//!   never reconnect from a stale retry

use std::time::Duration;

use chatwarden::models::session::SessionState;
use chatwarden::persistence::creds::CredentialMaterial;
use chatwarden::registry::RESERVED_SESSION_ID;
use chatwarden::transport::{CloseReason, TransportEvent};
use chatwarden::AppError;

use super::test_helpers::{harness, harness_from, wait_until};

#[tokio::test]
async fn reserved_session_cannot_be_deleted() {
    let h = harness();
    let _ = h.registry.get(RESERVED_SESSION_ID);

    let err = h
        .supervisor
        .delete_session(RESERVED_SESSION_ID)
        .await
        .expect_err("reserved id must be refused");
    assert!(matches!(err, AppError::ReservedSession(_)), "got {err:?}");
    assert!(
        h.registry.peek(RESERVED_SESSION_ID).is_some(),
        "refusal must not detach the record"
    );
}

#[tokio::test]
async fn delete_removes_record_and_credential_directory() {
    let h = harness();
    h.creds
        .store("s1", &CredentialMaterial::paired("5551234".into()))
        .expect("seed credentials");
    let _ = h.registry.get("s1");

    h.supervisor.delete_session("s1").await.expect("delete");

    assert!(h.registry.peek("s1").is_none());
    assert!(!h.creds.session_dir("s1").exists());
}

#[tokio::test]
async fn delete_tears_down_a_live_connection() {
    let h = harness();
    h.transport.script_open(vec![TransportEvent::Opened {
        identity: "5551234".into(),
    }]);
    h.supervisor.connect("s1").await.expect("connect");
    let handle = h.registry.get("s1");
    assert!(
        wait_until(Duration::from_secs(2), || {
            handle.state() == SessionState::Connected
        })
        .await
    );

    h.supervisor.delete_session("s1").await.expect("delete");

    let link = h.transport.link("s1").expect("link was opened");
    assert!(
        link.closed.load(std::sync::atomic::Ordering::SeqCst),
        "deletion must close the live transport"
    );
    assert!(h.registry.peek("s1").is_none());
}

#[tokio::test]
async fn delete_of_an_unknown_session_is_not_found() {
    let h = harness();
    let err = h
        .supervisor
        .delete_session("ghost")
        .await
        .expect_err("nothing exists in memory or on disk");
    assert!(matches!(err, AppError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn delete_works_for_disk_only_sessions() {
    let h = harness();
    // Credentials exist from a prior process run; no in-memory record yet.
    h.creds
        .store("cold", &CredentialMaterial::paired("5550000".into()))
        .expect("seed credentials");

    h.supervisor.delete_session("cold").await.expect("delete");
    assert!(!h.creds.session_dir("cold").exists());
}

#[tokio::test]
async fn delete_cancels_a_pending_reconnect() {
    // Long retry delay so the pending timer is still armed when we delete.
    let h = harness_from(
        r"
session_root = '{root}'
http_port = 0

[reconnect]
base_delay_ms = 300
max_delay_ms = 600
max_attempts = 5

[pairing]
poll_interval_ms = 20
wait_timeout_seconds = 1
",
    );
    h.supervisor.connect("s1").await.expect("connect");
    h.transport
        .emit(
            "s1",
            TransportEvent::Closed {
                reason: CloseReason::ConnectionLost,
            },
        )
        .await;

    let handle = h.registry.get("s1");
    assert!(
        wait_until(Duration::from_secs(2), || handle.reconnect_attempts() == 1).await,
        "close must be processed before deleting"
    );

    h.supervisor.delete_session("s1").await.expect("delete");

    // Past the retry deadline: the cancelled timer must not have re-opened
    // a transport or resurrected the registry entry.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(h.transport.open_calls(), 1, "a deleted session must never reconnect");
    assert!(h.registry.peek("s1").is_none());
}
