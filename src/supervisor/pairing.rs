//! Pairing-wait protocol: bounded blocking over the session record.
//!
//! Bridges the event-driven transport into a request/response shape: the
//! caller blocks until a pairing code or a connection is observable, or the
//! timeout elapses. Cooperative polling over the shared record bounds
//! staleness to one poll interval; no condition variable is needed. The
//! wait returns exactly once, and its timeout never cancels the underlying
//! connection attempt — a late pairing code is picked up by a later call.

use std::time::Duration;

use tokio::time::Instant;

use crate::models::session::SessionState;
use crate::registry::SessionRegistry;
use crate::{AppError, Result};

/// Terminal outcome of a pairing wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// A pairing code is available for out-of-band presentation.
    Code(String),
    /// The session reached `Connected` before (or instead of) issuing a code.
    Connected {
        /// The authenticated account identifier, when known.
        identity: Option<String>,
    },
}

/// Block until `id` yields a pairing code or connects, up to `timeout`.
///
/// The caller is responsible for having initiated a connection attempt
/// beforehand; this loop only observes, it never dials.
///
/// # Errors
///
/// Returns [`AppError::PairingTimeout`] when the timeout elapses, or
/// [`AppError::RetriesExhausted`] when the record is observed in `Failed`
/// (waiting out the full timeout would be pointless).
pub async fn wait_for_pairing(
    registry: &SessionRegistry,
    id: &str,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<PairingOutcome> {
    let handle = registry.get(id);
    let deadline = Instant::now() + timeout;

    loop {
        let (state, code, identity) = handle.pairing_view();
        match state {
            SessionState::Connected => {
                return Ok(PairingOutcome::Connected { identity });
            }
            SessionState::Failed => {
                return Err(AppError::RetriesExhausted(format!(
                    "session {id} exhausted its reconnect budget; delete and re-pair it"
                )));
            }
            _ => {
                if let Some(code) = code {
                    return Ok(PairingOutcome::Code(code));
                }
            }
        }

        if Instant::now() >= deadline {
            return Err(AppError::PairingTimeout(format!(
                "no pairing code or connection for session {id} within {}s",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
