//! Unit tests for the inactivity evictor's timer discipline.
//!
//! Exercises the timer surface directly through the fired-session channel;
//! the supervisor-side teardown is covered by the integration suite.

use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;

use chatwarden::supervisor::evictor::IdleEvictor;

#[tokio::test]
async fn timer_fires_after_the_quiet_period() {
    let (evictor, mut fired) = IdleEvictor::new();
    evictor.schedule("s1", Duration::from_millis(40));
    assert!(evictor.pending("s1"));

    let id = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("timer must fire")
        .expect("channel open");
    assert_eq!(id, "s1");
    assert!(!evictor.pending("s1"), "a fired timer is no longer pending");
}

#[tokio::test]
async fn rescheduling_supersedes_instead_of_stacking() {
    let (evictor, mut fired) = IdleEvictor::new();
    evictor.schedule("s1", Duration::from_millis(50));
    evictor.schedule("s1", Duration::from_millis(200));

    // Past the first deadline: the superseded timer must stay silent.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(fired.try_recv(), Err(TryRecvError::Empty)));
    assert!(evictor.pending("s1"));

    // Exactly one eviction arrives, from the replacement timer.
    let id = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("replacement timer must fire")
        .expect("channel open");
    assert_eq!(id, "s1");
    assert!(matches!(fired.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn activity_pushes_out_the_deadline() {
    let (evictor, mut fired) = IdleEvictor::new();
    evictor.schedule("s1", Duration::from_millis(150));

    tokio::time::sleep(Duration::from_millis(80)).await;
    evictor.mark_activity("s1", Duration::from_millis(150));

    // Past the original deadline, before the refreshed one.
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(
        matches!(fired.try_recv(), Err(TryRecvError::Empty)),
        "activity must have pushed out the eviction deadline"
    );

    let id = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("refreshed timer must fire")
        .expect("channel open");
    assert_eq!(id, "s1");
}

#[tokio::test]
async fn activity_without_a_pending_timer_arms_nothing() {
    let (evictor, mut fired) = IdleEvictor::new();
    evictor.mark_activity("s1", Duration::from_millis(30));
    assert!(!evictor.pending("s1"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(fired.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn cancel_is_idempotent_and_silences_the_timer() {
    let (evictor, mut fired) = IdleEvictor::new();

    // Cancelling with nothing pending is a no-op.
    evictor.cancel("s1");

    evictor.schedule("s1", Duration::from_millis(40));
    evictor.cancel("s1");
    assert!(!evictor.pending("s1"));
    evictor.cancel("s1");

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(matches!(fired.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn timers_are_keyed_per_session() {
    let (evictor, mut fired) = IdleEvictor::new();
    evictor.schedule("s1", Duration::from_millis(30));
    evictor.schedule("s2", Duration::from_millis(60));

    let first = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("first fire")
        .expect("channel open");
    let second = tokio::time::timeout(Duration::from_secs(2), fired.recv())
        .await
        .expect("second fire")
        .expect("channel open");
    assert_eq!(first, "s1");
    assert_eq!(second, "s2");
}
