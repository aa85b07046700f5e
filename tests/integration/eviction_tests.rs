//! Integration tests for idle eviction through the supervisor.
//!
//! A fired timer performs a graceful close: the transport is torn down, the
//! record returns to `disconnected`, and persisted credentials survive so
//! the session can lazily reconnect later.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chatwarden::models::session::SessionState;
use chatwarden::persistence::creds::CredentialMaterial;
use chatwarden::supervisor::evictor::{spawn_eviction_consumer, IdleEvictor};
use chatwarden::transport::TransportEvent;

use super::test_helpers::{harness, wait_until, TestHarness};

async fn connected_session(h: &TestHarness, id: &str) {
    h.transport.script_open(vec![TransportEvent::Opened {
        identity: "5551234".into(),
    }]);
    h.supervisor.connect(id).await.expect("connect");
    let handle = h.registry.get(id);
    assert!(
        wait_until(Duration::from_secs(2), || {
            handle.state() == SessionState::Connected
        })
        .await
    );
}

#[tokio::test]
async fn fired_timer_disconnects_but_preserves_credentials() {
    let h = harness();
    h.creds
        .store("s1", &CredentialMaterial::paired("5551234".into()))
        .expect("seed credentials");
    connected_session(&h, "s1").await;

    let (evictor, fired_rx) = IdleEvictor::new();
    let cancel = CancellationToken::new();
    let consumer = spawn_eviction_consumer(fired_rx, Arc::clone(&h.supervisor), cancel.clone());

    evictor.schedule("s1", Duration::from_millis(50));

    let handle = h.registry.get("s1");
    assert!(
        wait_until(Duration::from_secs(2), || {
            handle.state() == SessionState::Disconnected
        })
        .await,
        "eviction must transition the record to disconnected"
    );

    let link = h.transport.link("s1").expect("link was opened");
    assert!(
        link.closed.load(Ordering::SeqCst),
        "eviction must close the transport gracefully"
    );
    assert!(
        h.creds.has_valid("s1"),
        "eviction is not a logout; credentials must survive"
    );

    cancel.cancel();
    let _ = consumer.await;
}

#[tokio::test]
async fn activity_keeps_an_armed_session_alive() {
    let h = harness();
    connected_session(&h, "s1").await;

    let (evictor, fired_rx) = IdleEvictor::new();
    let cancel = CancellationToken::new();
    let consumer = spawn_eviction_consumer(fired_rx, Arc::clone(&h.supervisor), cancel.clone());

    evictor.schedule("s1", Duration::from_millis(200));
    tokio::time::sleep(Duration::from_millis(100)).await;
    evictor.mark_activity("s1", Duration::from_millis(200));

    // Past the original deadline the session must still be connected.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let handle = h.registry.get("s1");
    assert_eq!(handle.state(), SessionState::Connected);

    // The refreshed deadline eventually evicts.
    assert!(
        wait_until(Duration::from_secs(2), || {
            handle.state() == SessionState::Disconnected
        })
        .await
    );

    cancel.cancel();
    let _ = consumer.await;
}

#[tokio::test]
async fn cancelled_timer_never_evicts() {
    let h = harness();
    connected_session(&h, "s1").await;

    let (evictor, fired_rx) = IdleEvictor::new();
    let cancel = CancellationToken::new();
    let consumer = spawn_eviction_consumer(fired_rx, Arc::clone(&h.supervisor), cancel.clone());

    evictor.schedule("s1", Duration::from_millis(60));
    evictor.cancel("s1");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let handle = h.registry.get("s1");
    assert_eq!(
        handle.state(),
        SessionState::Connected,
        "a cancelled timer must leave the session alone"
    );

    cancel.cancel();
    let _ = consumer.await;
}
