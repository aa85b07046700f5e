//! Session state container and lifecycle transitions.
//!
//! A [`SessionRecord`] is the single source of truth for one logical
//! session. It is owned by the registry and mutated only through the
//! narrow transition methods below — route handlers never touch fields
//! directly, which keeps the record's invariants local to this module:
//!
//! - a pairing code is only present in [`SessionState::PairingReady`];
//! - an identity is only present in [`SessionState::Connected`];
//! - at most one live transport link is attached at any time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transport::TransportLink;

/// Lifecycle state for a supervised session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No live transport; the idle/default state.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// A pairing code has been issued and awaits an out-of-band scan.
    PairingReady,
    /// Transport open and authenticated.
    Connected,
    /// Automatic reconnection budget exhausted; external intervention needed.
    Failed,
    /// The last connection attempt ended in a transport error.
    Errored,
}

impl SessionState {
    /// Wire representation used in HTTP payloads and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::PairingReady => "pairing_ready",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Errored => "error",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable snapshot of one session, as returned by the list operation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSummary {
    /// Stable, externally supplied session identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Authenticated account identifier, when connected.
    pub identity: Option<String>,
    /// Whether an unconsumed pairing code is stored.
    pub has_pairing_code: bool,
    /// Consecutive reconnect attempts since the last reset.
    pub reconnect_attempts: u32,
}

/// State container for one logical session.
///
/// Plain data plus transition methods; locking and the connect permit live
/// in the registry's [`SessionHandle`](crate::registry::SessionHandle).
pub struct SessionRecord {
    state: SessionState,
    pairing_code: Option<String>,
    identity: Option<String>,
    reconnect_attempts: u32,
    link: Option<Arc<dyn TransportLink>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// A fresh record: disconnected, no pairing code, zero attempts.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: SessionState::Disconnected,
            pairing_code: None,
            identity: None,
            reconnect_attempts: 0,
            link: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Stored pairing code, when one is awaiting a scan.
    #[must_use]
    pub fn pairing_code(&self) -> Option<&str> {
        self.pairing_code.as_deref()
    }

    /// Authenticated account identifier, when connected.
    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Consecutive reconnect attempts since the last reset.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Record creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent transition.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The live transport link, if one is attached.
    #[must_use]
    pub fn link(&self) -> Option<Arc<dyn TransportLink>> {
        self.link.clone()
    }

    /// Attach a freshly opened transport link.
    pub fn attach_link(&mut self, link: Arc<dyn TransportLink>) {
        self.link = Some(link);
        self.touch();
    }

    /// Detach and return the current transport link, if any.
    pub fn detach_link(&mut self) -> Option<Arc<dyn TransportLink>> {
        self.touch();
        self.link.take()
    }

    /// A connection attempt has started.
    pub fn note_connecting(&mut self) {
        self.state = SessionState::Connecting;
        self.touch();
    }

    /// The transport issued a pairing code.
    ///
    /// A fresh code means the remote side is responsive, so the reconnect
    /// counter is forgiven.
    pub fn note_pairing_code(&mut self, code: String) {
        self.pairing_code = Some(code);
        self.state = SessionState::PairingReady;
        self.reconnect_attempts = 0;
        self.touch();
    }

    /// The transport reported an open, authenticated connection.
    pub fn note_opened(&mut self, identity: String) {
        self.identity = Some(identity);
        self.pairing_code = None;
        self.state = SessionState::Connected;
        self.reconnect_attempts = 0;
        self.touch();
    }

    /// The transport closed with a logged-out reason.
    ///
    /// Credentials are wiped by the caller; the record stays registered so a
    /// fresh pairing can be issued under the same identifier.
    pub fn note_logged_out(&mut self) {
        self.state = SessionState::Disconnected;
        self.pairing_code = None;
        self.identity = None;
        self.reconnect_attempts = 0;
        self.link = None;
        self.touch();
    }

    /// The transport closed for a retryable reason.
    ///
    /// Returns the incremented attempt count so the caller can decide
    /// whether to schedule a retry.
    pub fn note_closed_retryable(&mut self) -> u32 {
        self.state = SessionState::Disconnected;
        self.identity = None;
        self.link = None;
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.touch();
        self.reconnect_attempts
    }

    /// Opening the transport failed before any connection existed.
    ///
    /// Same retry accounting as a retryable close, but the record lands in
    /// [`SessionState::Errored`].
    pub fn note_open_error(&mut self) -> u32 {
        self.state = SessionState::Errored;
        self.identity = None;
        self.link = None;
        self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
        self.touch();
        self.reconnect_attempts
    }

    /// The reconnection budget was observed exhausted by a connect call.
    pub fn mark_failed(&mut self) {
        self.state = SessionState::Failed;
        self.touch();
    }

    /// Graceful, deliberate disconnect (eviction or operator teardown).
    ///
    /// Credentials are preserved; the pairing code and retry counter reset
    /// so the next connect starts clean.
    pub fn note_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.pairing_code = None;
        self.identity = None;
        self.reconnect_attempts = 0;
        self.link = None;
        self.touch();
    }

    /// Snapshot for the list operation.
    #[must_use]
    pub fn summary(&self, id: &str) -> SessionSummary {
        SessionSummary {
            id: id.to_owned(),
            state: self.state,
            identity: self.identity.clone(),
            has_pairing_code: self.pairing_code.is_some(),
            reconnect_attempts: self.reconnect_attempts,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}
