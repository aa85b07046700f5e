//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Transport open, send, or close failure.
    Transport(String),
    /// Credential store read/write failure.
    Credentials(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Operation requires a connected session.
    NotConnected(String),
    /// Bounded pairing wait elapsed without a pairing code or connection.
    PairingTimeout(String),
    /// Automatic reconnection budget is exhausted for this session.
    RetriesExhausted(String),
    /// The reserved session id cannot be deleted.
    ReservedSession(String),
    /// Request payload failed structural validation.
    InvalidPayload(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Credentials(msg) => write!(f, "credentials: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::NotConnected(msg) => write!(f, "not connected: {msg}"),
            Self::PairingTimeout(msg) => write!(f, "pairing timeout: {msg}"),
            Self::RetriesExhausted(msg) => write!(f, "retries exhausted: {msg}"),
            Self::ReservedSession(msg) => write!(f, "reserved session: {msg}"),
            Self::InvalidPayload(msg) => write!(f, "invalid payload: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
