//! Startup restorer: reconnect persisted sessions after a process restart.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::supervisor::Supervisor;

/// Spawn the fire-and-forget restore pass.
///
/// Enumerates credential directories and starts a connection attempt for
/// each candidate, staggered by `stagger` to avoid a reconnect thundering
/// herd. Individual failures are logged and do not halt restoration of the
/// remaining sessions. Runs after the HTTP listener is up and never blocks
/// process readiness.
#[must_use]
pub fn spawn_restore(supervisor: Arc<Supervisor>, stagger: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = supervisor.creds().ensure_root() {
            error!(%err, "cannot create session root, skipping restore");
            return;
        }

        let candidates = match supervisor.creds().list_candidates() {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(%err, "cannot enumerate session root, skipping restore");
                return;
            }
        };

        if candidates.is_empty() {
            info!("no persisted sessions to restore");
            return;
        }

        info!(count = candidates.len(), "restoring persisted sessions");
        for id in candidates {
            info!(session_id = %id, "restoring session");
            if let Err(err) = supervisor.connect(&id).await {
                warn!(session_id = %id, %err, "restore attempt failed, continuing");
            }
            tokio::time::sleep(stagger).await;
        }
        info!("session restore pass complete");
    })
}
