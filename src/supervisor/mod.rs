//! Connection supervision: the per-session lifecycle state machine.
//!
//! The supervisor owns every state transition on a session record. It opens
//! transports under the per-session connect permit, bridges each transport's
//! event stream into record mutations, schedules retries per the
//! [`ReconnectPolicy`](backoff::ReconnectPolicy), and performs defensive
//! teardown. Other components reach the transport only through it.

pub mod backoff;
pub mod evictor;
pub mod pairing;
pub mod restore;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::GlobalConfig;
use crate::models::session::SessionState;
use crate::persistence::creds::CredentialStore;
use crate::registry::{ConnectPermit, SessionHandle, SessionRegistry, RESERVED_SESSION_ID};
use crate::supervisor::backoff::ReconnectPolicy;
use crate::transport::{Transport, TransportEvent};
use crate::{AppError, Result};

/// Capacity of each per-attempt transport event channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Status-route report, including the lazy auto-reconnect decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Session identifier the report describes.
    pub id: String,
    /// Whether the session is currently connected.
    pub connected: bool,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Whether valid credentials are persisted on disk.
    pub credentials_on_disk: bool,
    /// Whether this query triggered a background reconnect.
    pub auto_reconnecting: bool,
}

/// Orchestrates transport lifecycle per session.
pub struct Supervisor {
    config: Arc<GlobalConfig>,
    registry: Arc<SessionRegistry>,
    creds: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    policy: ReconnectPolicy,
}

impl Supervisor {
    /// Build a supervisor over the shared registry, store, and transport.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        registry: Arc<SessionRegistry>,
        creds: Arc<CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let policy = ReconnectPolicy::from_config(&config.reconnect);
        Self {
            config,
            registry,
            creds,
            transport,
            policy,
        }
    }

    /// The reconnection policy in force.
    #[must_use]
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// The shared session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// The shared credential store.
    #[must_use]
    pub fn creds(&self) -> &Arc<CredentialStore> {
        &self.creds
    }

    /// Ensure a connection attempt is running for `id`.
    ///
    /// No-op while another attempt holds the connect permit. A session whose
    /// retry budget is exhausted transitions to `Failed` without opening a
    /// transport. Otherwise any stale link is torn down, a transport is
    /// opened, and its event stream is pumped into record transitions until
    /// the connection closes.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if opening the transport fails (a
    /// retry is scheduled first when budget remains), or [`AppError::Io`] if
    /// the session's credential directory cannot be created.
    pub async fn connect(self: &Arc<Self>, id: &str) -> Result<()> {
        let handle = self.registry.get(id);

        let Some(permit) = handle.try_begin_connect() else {
            debug!(session_id = %id, "connection attempt already in flight, skipping");
            return Ok(());
        };

        if self.policy.exhausted(handle.reconnect_attempts()) {
            warn!(
                session_id = %id,
                max_attempts = self.policy.max_attempts,
                "reconnect budget exhausted, marking session failed"
            );
            handle.mark_failed();
            return Ok(());
        }

        self.teardown_link(&handle).await;
        self.creds.ensure_session_dir(id)?;
        handle.note_connecting();

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        match self
            .transport
            .open(id, Arc::clone(&self.creds), event_tx)
            .await
        {
            Ok(link) => {
                handle.attach_link(link);
                let pump_ct = CancellationToken::new();
                handle.install_pump_token(pump_ct.clone());
                info!(session_id = %id, "transport opened, pumping events");
                tokio::spawn(Self::pump_events(
                    Arc::clone(self),
                    Arc::clone(&handle),
                    event_rx,
                    pump_ct,
                    permit,
                ));
                Ok(())
            }
            Err(err) => {
                let attempts = handle.note_open_error();
                warn!(session_id = %id, %err, attempts, "transport open failed");
                if self.policy.exhausted(attempts) {
                    warn!(session_id = %id, "no retry budget left after open failure");
                } else {
                    self.schedule_retry(&handle, attempts);
                }
                Err(err)
            }
        }
    }

    /// Bridge one attempt's event stream into session record transitions.
    ///
    /// Holds the connect permit until the attempt resolves: released on the
    /// first `Opened` or `Closed` event, or when the pump exits for any
    /// other reason (cancellation, sender dropped).
    async fn pump_events(
        self: Arc<Self>,
        handle: Arc<SessionHandle>,
        mut events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
        permit: ConnectPermit,
    ) {
        let mut permit = Some(permit);

        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => {
                    debug!(session_id = %handle.id(), "event pump cancelled");
                    break;
                }
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        debug!(session_id = %handle.id(), "transport event stream ended");
                        break;
                    };
                    event
                }
            };

            match event {
                TransportEvent::Connecting => {
                    handle.note_connecting();
                }
                TransportEvent::PairingCode(code) => {
                    info!(session_id = %handle.id(), "pairing code issued");
                    handle.note_pairing_code(code);
                }
                TransportEvent::Opened { identity } => {
                    info!(session_id = %handle.id(), identity = %identity, "session connected");
                    handle.note_opened(identity);
                    permit.take();
                }
                TransportEvent::Closed { reason } => {
                    permit.take();
                    handle.detach_link();

                    if ReconnectPolicy::should_retry(&reason) {
                        let attempts = handle.note_closed_retryable();
                        info!(
                            session_id = %handle.id(),
                            ?reason,
                            attempts,
                            "connection closed"
                        );
                        if self.policy.exhausted(attempts) {
                            warn!(
                                session_id = %handle.id(),
                                max_attempts = self.policy.max_attempts,
                                "reconnect budget exhausted, awaiting manual intervention"
                            );
                        } else {
                            self.schedule_retry(&handle, attempts);
                        }
                    } else {
                        info!(session_id = %handle.id(), "logged out, wiping credentials");
                        if let Err(err) = self.creds.wipe(handle.id()) {
                            // Best-effort: a failed wipe must not take the pump down.
                            warn!(session_id = %handle.id(), %err, "failed to wipe credentials after logout");
                        }
                        handle.note_logged_out();
                    }
                    break;
                }
            }
        }
    }

    /// Arm a one-shot retry timer for `handle`, superseding any pending one.
    fn schedule_retry(self: &Arc<Self>, handle: &Arc<SessionHandle>, attempts: u32) {
        let delay = self.policy.delay(attempts);
        let token = CancellationToken::new();
        handle.install_retry_token(token.clone());

        info!(
            session_id = %handle.id(),
            attempts,
            max_attempts = self.policy.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling reconnect"
        );

        let supervisor = Arc::clone(self);
        let id = handle.id().to_owned();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    debug!(session_id = %id, "pending reconnect cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if let Err(err) = supervisor.connect(&id).await {
                        warn!(session_id = %id, %err, "scheduled reconnect failed");
                    }
                }
            }
        });
    }

    /// Defensively tear down any live transport for `handle`.
    ///
    /// Cancels the attempt's event pump first so a stale transport cannot
    /// deliver events after teardown, then closes the link. Close failures
    /// are logged and swallowed, never propagated.
    async fn teardown_link(&self, handle: &Arc<SessionHandle>) {
        handle.cancel_pump();
        if let Some(link) = handle.detach_link() {
            if let Err(err) = link.close().await {
                warn!(session_id = %handle.id(), %err, "error closing stale transport");
            }
        }
    }

    /// Gracefully disconnect `id` (eviction or operator teardown).
    ///
    /// Credentials are preserved; the record returns to `Disconnected` with
    /// a clean retry counter. Unknown ids are a no-op.
    pub async fn disconnect(&self, id: &str) {
        let Some(handle) = self.registry.peek(id) else {
            return;
        };
        info!(session_id = %id, "disconnecting session");
        self.teardown_link(&handle).await;
        handle.note_disconnected();
    }

    /// Delete `id`: tear down its transport, cancel pending retries, remove
    /// the registry record, and erase the on-disk credential directory.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ReservedSession`] for the reserved id,
    /// [`AppError::NotFound`] when the session exists neither in memory nor
    /// on disk, or [`AppError::Io`] if the credential directory cannot be
    /// removed.
    pub async fn delete_session(&self, id: &str) -> Result<()> {
        if id == RESERVED_SESSION_ID {
            return Err(AppError::ReservedSession(format!(
                "cannot delete reserved session {RESERVED_SESSION_ID:?}"
            )));
        }

        let on_disk = self.creds.exists(id);
        if let Some(handle) = self.registry.peek(id) {
            handle.cancel_retry();
            self.teardown_link(&handle).await;
        } else if !on_disk {
            return Err(AppError::NotFound(format!("no session found for {id}")));
        }

        let removed = self.registry.remove(id);
        self.creds.wipe(id)?;
        info!(session_id = %id, removed_record = removed, had_credentials = on_disk, "session deleted");
        Ok(())
    }

    /// Send a text message from `id` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotConnected`] unless the session is `Connected`,
    /// [`AppError::NotFound`] when the address does not exist on the
    /// network, or [`AppError::Transport`] if the send fails.
    pub async fn send_text(&self, id: &str, to: &str, text: &str) -> Result<()> {
        let link = self.require_connected(id)?;
        let canonical = link
            .lookup(to)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{to} is not reachable on the network")))?;
        link.send_text(&canonical, text).await?;
        info!(session_id = %id, to = %canonical, "text message sent");
        Ok(())
    }

    /// Send a document from `id` to `to`.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Supervisor::send_text`].
    pub async fn send_document(
        &self,
        id: &str,
        to: &str,
        payload: bytes::Bytes,
        filename: &str,
        caption: &str,
    ) -> Result<()> {
        let link = self.require_connected(id)?;
        let canonical = link
            .lookup(to)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{to} is not reachable on the network")))?;
        link.send_document(&canonical, payload, filename, caption)
            .await?;
        info!(session_id = %id, to = %canonical, filename = %filename, "document sent");
        Ok(())
    }

    /// Status for `id`, with the lazy auto-reconnect side effect.
    ///
    /// A disconnected session with valid persisted credentials triggers a
    /// background connect: sessions are not kept alive speculatively, they
    /// reconnect when someone asks about them.
    #[must_use]
    pub fn status(self: &Arc<Self>, id: &str) -> StatusReport {
        let state = self
            .registry
            .peek(id)
            .map_or(SessionState::Disconnected, |h| h.state());
        let credentials_on_disk = self.creds.has_valid(id);
        let connected = state == SessionState::Connected;

        let mut auto_reconnecting = false;
        if credentials_on_disk && state == SessionState::Disconnected {
            info!(session_id = %id, "disconnected session has valid credentials, reconnecting in background");
            auto_reconnecting = true;
            self.spawn_connect(id);
        }

        StatusReport {
            id: id.to_owned(),
            connected,
            state,
            credentials_on_disk,
            auto_reconnecting,
        }
    }

    /// Fire-and-forget connect; failures are logged, nobody is waiting.
    pub fn spawn_connect(self: &Arc<Self>, id: &str) {
        let supervisor = Arc::clone(self);
        let id = id.to_owned();
        tokio::spawn(async move {
            if let Err(err) = supervisor.connect(&id).await {
                warn!(session_id = %id, %err, "background connect failed");
            }
        });
    }

    fn require_connected(&self, id: &str) -> Result<Arc<dyn crate::transport::TransportLink>> {
        let handle = self.registry.peek(id).ok_or_else(|| {
            AppError::NotConnected(format!("session {id} is not connected, call connect first"))
        })?;
        handle.connected_link().ok_or_else(|| {
            AppError::NotConnected(format!(
                "session {id} is not connected, current state: {}",
                handle.state()
            ))
        })
    }
}
