#![forbid(unsafe_code)]

//! Multi-tenant messaging session supervisor.
//!
//! Supervises long-lived, stateful transport sessions: QR pairing with a
//! bounded wait, automatic reconnection with exponential backoff, on-disk
//! credential persistence with restore-on-startup, inactivity eviction, and
//! message dispatch — all behind an HTTP API.

pub mod config;
pub mod errors;
pub mod http;
pub mod models;
pub mod persistence;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
