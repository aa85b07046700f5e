//! Transport capability boundary.
//!
//! The [`Transport`] trait decouples the session lifecycle core (registry,
//! supervisor, evictor, restore) from the wire protocol. Implementations own
//! the pairing handshake, encryption, and framing; the core only consumes
//! the closed [`TransportEvent`] stream and the [`TransportLink`] surface.

pub mod dev;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::persistence::creds::CredentialStore;
use crate::Result;

/// Boxed future alias used by the object-safe transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Why a transport connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The remote side invalidated this device pairing permanently.
    LoggedOut,
    /// The connection dropped for a transient network reason.
    ConnectionLost,
    /// Another device took over the pairing; retry is worthwhile.
    Replaced,
    /// The transport stream reported a protocol-level error.
    StreamError(String),
}

impl CloseReason {
    /// Whether this close permanently invalidated the session's credentials.
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// Events emitted by a transport into the per-attempt event channel.
///
/// The set is closed: the supervisor consumes it with exhaustive matching so
/// unexpected transport behavior cannot silently fall through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport is dialing the remote side.
    Connecting,
    /// A pairing payload was issued and awaits an out-of-band scan.
    PairingCode(String),
    /// The connection is open and authenticated.
    Opened {
        /// The authenticated account identifier.
        identity: String,
    },
    /// The connection closed.
    Closed {
        /// Why the connection closed.
        reason: CloseReason,
    },
}

/// A live, opened transport connection for one session.
pub trait TransportLink: Send + Sync {
    /// Resolve an address to its canonical on-network form.
    ///
    /// Returns `None` when the address does not exist on the network.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// lookup query fails.
    fn lookup(&self, address: &str) -> BoxFuture<'_, Result<Option<String>>>;

    /// Send a text message to a canonical address.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// send fails.
    fn send_text(&self, address: &str, text: &str) -> BoxFuture<'_, Result<()>>;

    /// Send a document with a filename and caption to a canonical address.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// send fails.
    fn send_document(
        &self,
        address: &str,
        payload: Bytes,
        filename: &str,
        caption: &str,
    ) -> BoxFuture<'_, Result<()>>;

    /// Close the connection gracefully.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// close handshake fails. Callers tearing down a stale link log and
    /// swallow this.
    fn close(&self) -> BoxFuture<'_, Result<()>>;
}

/// Factory for per-session transport connections.
pub trait Transport: Send + Sync {
    /// Open a connection for `session_id`.
    ///
    /// The implementation persists credential material through `store`
    /// whenever it changes, and delivers lifecycle events on `events`.
    /// Event delivery after the receiver is dropped is silently discarded.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// connection cannot be opened.
    fn open(
        &self,
        session_id: &str,
        store: Arc<CredentialStore>,
        events: mpsc::Sender<TransportEvent>,
    ) -> BoxFuture<'_, Result<Arc<dyn TransportLink>>>;
}
