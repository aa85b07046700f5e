//! Process-wide session registry.
//!
//! The registry is the sole authority on the identifier-to-record mapping:
//! no two callers can observe two different records for the same id. The
//! map itself is guarded by one short-held mutex; each [`SessionHandle`]
//! carries its own record lock so unrelated sessions never serialize on a
//! shared lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::models::session::{SessionRecord, SessionState, SessionSummary};
use crate::transport::TransportLink;

/// Session id that can never be deleted.
pub const RESERVED_SESSION_ID: &str = "default";

/// Shared, lock-guarded access to one session's record plus the per-session
/// coordination state: the connect permit and the pending retry timer.
pub struct SessionHandle {
    id: String,
    record: Mutex<SessionRecord>,
    connecting: AtomicBool,
    retry: Mutex<Option<CancellationToken>>,
    pump: Mutex<Option<CancellationToken>>,
}

impl SessionHandle {
    fn new(id: String) -> Self {
        Self {
            id,
            record: Mutex::new(SessionRecord::new()),
            connecting: AtomicBool::new(false),
            retry: Mutex::new(None),
            pump: Mutex::new(None),
        }
    }

    /// The stable session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    fn with_record<R>(&self, f: impl FnOnce(&mut SessionRecord) -> R) -> R {
        let mut guard = self
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Try to acquire the connect permit for one attempt.
    ///
    /// Returns `None` while another attempt is in flight — the single
    /// mechanism preventing duplicate simultaneous connection attempts. The
    /// permit releases itself on drop, so every exit path of an attempt
    /// (success, failure, panic unwind) releases it.
    #[must_use]
    pub fn try_begin_connect(self: &Arc<Self>) -> Option<ConnectPermit> {
        if self
            .connecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(ConnectPermit {
                handle: Arc::clone(self),
            })
        } else {
            None
        }
    }

    /// Whether a connection attempt currently holds the permit.
    #[must_use]
    pub fn connect_in_flight(&self) -> bool {
        self.connecting.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.with_record(|r| r.state())
    }

    /// Stored pairing code, when one awaits a scan.
    #[must_use]
    pub fn pairing_code(&self) -> Option<String> {
        self.with_record(|r| r.pairing_code().map(str::to_owned))
    }

    /// Consecutive reconnect attempts since the last reset.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.with_record(|r| r.reconnect_attempts())
    }

    /// One consistent view for the pairing-wait poll loop.
    #[must_use]
    pub fn pairing_view(&self) -> (SessionState, Option<String>, Option<String>) {
        self.with_record(|r| {
            (
                r.state(),
                r.pairing_code().map(str::to_owned),
                r.identity().map(str::to_owned),
            )
        })
    }

    /// The live link, only when the session is connected.
    #[must_use]
    pub fn connected_link(&self) -> Option<Arc<dyn TransportLink>> {
        self.with_record(|r| {
            if r.state() == SessionState::Connected {
                r.link()
            } else {
                None
            }
        })
    }

    /// Attach a freshly opened link.
    pub fn attach_link(&self, link: Arc<dyn TransportLink>) {
        self.with_record(|r| r.attach_link(link));
    }

    /// Detach and return the current link without closing it.
    pub fn detach_link(&self) -> Option<Arc<dyn TransportLink>> {
        self.with_record(SessionRecord::detach_link)
    }

    /// See [`SessionRecord::note_connecting`].
    pub fn note_connecting(&self) {
        self.with_record(SessionRecord::note_connecting);
    }

    /// See [`SessionRecord::note_pairing_code`].
    pub fn note_pairing_code(&self, code: String) {
        self.with_record(|r| r.note_pairing_code(code));
    }

    /// See [`SessionRecord::note_opened`].
    pub fn note_opened(&self, identity: String) {
        self.with_record(|r| r.note_opened(identity));
    }

    /// See [`SessionRecord::note_logged_out`].
    pub fn note_logged_out(&self) {
        self.with_record(SessionRecord::note_logged_out);
    }

    /// See [`SessionRecord::note_closed_retryable`].
    pub fn note_closed_retryable(&self) -> u32 {
        self.with_record(SessionRecord::note_closed_retryable)
    }

    /// See [`SessionRecord::note_open_error`].
    pub fn note_open_error(&self) -> u32 {
        self.with_record(SessionRecord::note_open_error)
    }

    /// See [`SessionRecord::mark_failed`].
    pub fn mark_failed(&self) {
        self.with_record(SessionRecord::mark_failed);
    }

    /// See [`SessionRecord::note_disconnected`].
    pub fn note_disconnected(&self) {
        self.with_record(SessionRecord::note_disconnected);
    }

    /// Observable snapshot of this session.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        self.with_record(|r| r.summary(&self.id))
    }

    /// Install a pending retry timer token, superseding any previous one.
    ///
    /// The superseded token is cancelled so at most one retry is pending.
    pub fn install_retry_token(&self, token: CancellationToken) {
        let mut guard = self.retry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.replace(token) {
            old.cancel();
        }
    }

    /// Cancel any pending retry timer. Idempotent.
    pub fn cancel_retry(&self) {
        let mut guard = self.retry.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.take() {
            token.cancel();
        }
    }

    /// Install the event-pump token for the current attempt, cancelling the
    /// previous pump so a stale transport cannot keep delivering events.
    pub fn install_pump_token(&self, token: CancellationToken) {
        let mut guard = self.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = guard.replace(token) {
            old.cancel();
        }
    }

    /// Cancel the current event pump. Idempotent.
    pub fn cancel_pump(&self) {
        let mut guard = self.pump.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = guard.take() {
            token.cancel();
        }
    }
}

/// RAII connect permit; releases the per-session guard on drop.
pub struct ConnectPermit {
    handle: Arc<SessionHandle>,
}

impl Drop for ConnectPermit {
    fn drop(&mut self) {
        self.handle.connecting.store(false, Ordering::SeqCst);
    }
}

/// Process-wide mapping from session id to [`SessionHandle`].
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handle for `id`, creating a fresh disconnected record on
    /// first reference. Idempotent, never fails.
    #[must_use]
    pub fn get(&self, id: &str) -> Arc<SessionHandle> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            guard
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(SessionHandle::new(id.to_owned()))),
        )
    }

    /// Get the handle for `id` only if it already exists.
    #[must_use]
    pub fn peek(&self, id: &str) -> Option<Arc<SessionHandle>> {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.get(id).cloned()
    }

    /// Snapshot summaries of every registered session, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<Arc<SessionHandle>> = {
            let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            guard.values().cloned().collect()
        };
        let mut out: Vec<SessionSummary> = handles.iter().map(|h| h.summary()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Detach the record for `id`, returning whether it existed.
    ///
    /// The caller must have already torn down the session's transport.
    pub fn remove(&self, id: &str) -> bool {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(id).is_some()
    }
}
