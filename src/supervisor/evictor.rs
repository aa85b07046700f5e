//! Inactivity evictor: per-session disconnect timers.
//!
//! Each armed session gets one pending timer; arming always supersedes the
//! previous timer, never stacks. Fired session ids are delivered on an
//! `mpsc` channel so the consumer (the supervisor, via
//! [`spawn_eviction_consumer`]) performs the actual graceful close —
//! credentials are preserved, eviction is not a logout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::supervisor::Supervisor;

/// Eviction event channel capacity.
const EVICTION_CHANNEL_CAPACITY: usize = 32;

struct PendingTimer {
    generation: u64,
    token: CancellationToken,
}

/// Schedules and supersedes idle-disconnect timers, one per session.
pub struct IdleEvictor {
    timers: Arc<Mutex<HashMap<String, PendingTimer>>>,
    generation: Mutex<u64>,
    fired_tx: mpsc::Sender<String>,
}

impl IdleEvictor {
    /// Build an evictor and the receiving end of its fired-session channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<String>) {
        let (fired_tx, fired_rx) = mpsc::channel(EVICTION_CHANNEL_CAPACITY);
        (
            Self {
                timers: Arc::new(Mutex::new(HashMap::new())),
                generation: Mutex::new(0),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Arm a disconnect timer for `id` after `quiet`, superseding any
    /// pending timer for the same session.
    pub fn schedule(&self, id: &str, quiet: Duration) {
        let token = CancellationToken::new();
        let generation = {
            let mut guard = self
                .generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *guard += 1;
            *guard
        };

        {
            let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(old) = guard.insert(
                id.to_owned(),
                PendingTimer {
                    generation,
                    token: token.clone(),
                },
            ) {
                old.token.cancel();
            }
        }

        info!(
            session_id = %id,
            quiet_secs = quiet.as_secs(),
            "disconnect timer armed"
        );

        let timers = Arc::clone(&self.timers);
        let fired_tx = self.fired_tx.clone();
        let id = id.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(session_id = %id, "disconnect timer superseded or cancelled");
                }
                () = tokio::time::sleep(quiet) => {
                    // Only the timer that still owns the map entry may fire;
                    // a superseded timer that lost the race stays silent.
                    let owns_entry = {
                        let mut guard = timers.lock().unwrap_or_else(PoisonError::into_inner);
                        match guard.get(&id) {
                            Some(pending) if pending.generation == generation => {
                                guard.remove(&id);
                                true
                            }
                            _ => false,
                        }
                    };
                    if owns_entry {
                        info!(session_id = %id, "idle quiet period elapsed, evicting");
                        let _ = fired_tx.send(id).await;
                    }
                }
            }
        });
    }

    /// Activity signal: push out the eviction deadline for `id`.
    ///
    /// Re-arms only a pending timer — activity on a session that never armed
    /// one does not start eviction tracking.
    pub fn mark_activity(&self, id: &str, quiet: Duration) {
        let pending = {
            let guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            guard.contains_key(id)
        };
        if pending {
            self.schedule(id, quiet);
        }
    }

    /// Remove any pending timer for `id` without side effects. Idempotent:
    /// cancelling an absent or already-fired timer is a no-op.
    pub fn cancel(&self, id: &str) {
        let removed = {
            let mut guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            guard.remove(id)
        };
        if let Some(pending) = removed {
            pending.token.cancel();
            debug!(session_id = %id, "disconnect timer cancelled");
        }
    }

    /// Whether a timer is currently pending for `id`.
    #[must_use]
    pub fn pending(&self, id: &str) -> bool {
        let guard = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(id)
    }
}

/// Spawn the consumer that turns fired timers into graceful disconnects.
///
/// Runs until the channel closes or the token fires. Returns the task's
/// `JoinHandle` so the caller can await clean shutdown.
#[must_use]
pub fn spawn_eviction_consumer(
    mut fired_rx: mpsc::Receiver<String>,
    supervisor: Arc<Supervisor>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let id = tokio::select! {
                () = cancel.cancelled() => {
                    info!("eviction consumer shutting down");
                    break;
                }
                maybe_id = fired_rx.recv() => {
                    let Some(id) = maybe_id else {
                        info!("eviction channel closed");
                        break;
                    };
                    id
                }
            };
            supervisor.disconnect(&id).await;
        }
    })
}
