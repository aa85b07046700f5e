//! In-process development transport.
//!
//! Stands in for the production wire protocol during local development and
//! in the test suites. Behavior: a session with valid stored credentials
//! resumes immediately; anything else is issued a pairing code. With
//! `auto_pair` enabled the pairing completes on its own after a short delay,
//! persisting synthetic credential material the way a real transport's
//! credential callback would.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::persistence::creds::{CredentialMaterial, CredentialStore};
use crate::transport::{BoxFuture, Transport, TransportEvent, TransportLink};
use crate::{AppError, Result};

/// Development transport factory.
#[derive(Debug, Clone)]
pub struct DevTransport {
    auto_pair: bool,
    auto_pair_delay: Duration,
}

impl DevTransport {
    /// Build a dev transport.
    ///
    /// `auto_pair` makes pairing complete unattended after `auto_pair_delay`.
    #[must_use]
    pub fn new(auto_pair: bool, auto_pair_delay: Duration) -> Self {
        Self {
            auto_pair,
            auto_pair_delay,
        }
    }

    fn pairing_code() -> String {
        // Short, scannable-looking payload; uniqueness is all that matters here.
        let raw = Uuid::new_v4().simple().to_string();
        format!("{}-{}", &raw[..4].to_uppercase(), &raw[4..8].to_uppercase())
    }
}

impl Default for DevTransport {
    fn default() -> Self {
        Self::new(false, Duration::from_millis(1500))
    }
}

impl Transport for DevTransport {
    fn open(
        &self,
        session_id: &str,
        store: Arc<CredentialStore>,
        events: mpsc::Sender<TransportEvent>,
    ) -> BoxFuture<'_, Result<Arc<dyn TransportLink>>> {
        let session_id = session_id.to_owned();
        let auto_pair = self.auto_pair;
        let auto_pair_delay = self.auto_pair_delay;

        Box::pin(async move {
            let _ = events.send(TransportEvent::Connecting).await;

            let stored = store.load(&session_id)?;
            match stored.and_then(|material| material.identity) {
                Some(identity) => {
                    info!(session_id = %session_id, identity = %identity, "dev transport resuming from stored credentials");
                    let _ = events.send(TransportEvent::Opened { identity }).await;
                }
                None => {
                    let code = Self::pairing_code();
                    debug!(session_id = %session_id, "dev transport issuing pairing code");
                    let _ = events.send(TransportEvent::PairingCode(code)).await;

                    if auto_pair {
                        let store = Arc::clone(&store);
                        let events = events.clone();
                        let session_id = session_id.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(auto_pair_delay).await;
                            let identity = synthetic_identity(&session_id);
                            let material = CredentialMaterial::paired(identity.clone());
                            if let Err(err) = store.store(&session_id, &material) {
                                warn!(session_id = %session_id, %err, "dev transport failed to persist credentials");
                                return;
                            }
                            let _ = events.send(TransportEvent::Opened { identity }).await;
                        });
                    }
                }
            }

            Ok(Arc::new(DevLink {
                session_id,
                events,
            }) as Arc<dyn TransportLink>)
        })
    }
}

/// Deterministic per-session phone-number-shaped identity.
fn synthetic_identity(session_id: &str) -> String {
    let suffix: u32 = session_id
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)))
        % 10_000_000;
    format!("155{suffix:07}")
}

/// Live dev connection; sends are logged, never delivered anywhere.
struct DevLink {
    session_id: String,
    events: mpsc::Sender<TransportEvent>,
}

impl TransportLink for DevLink {
    fn lookup(&self, address: &str) -> BoxFuture<'_, Result<Option<String>>> {
        let address = address.trim().trim_start_matches('+').to_owned();
        Box::pin(async move {
            if address.is_empty() || !address.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(None);
            }
            Ok(Some(format!("{address}@dev.chatwarden")))
        })
    }

    fn send_text(&self, address: &str, text: &str) -> BoxFuture<'_, Result<()>> {
        let session_id = self.session_id.clone();
        let address = address.to_owned();
        let chars = text.chars().count();
        Box::pin(async move {
            info!(session_id = %session_id, address = %address, chars, "dev transport text send");
            Ok(())
        })
    }

    fn send_document(
        &self,
        address: &str,
        payload: Bytes,
        filename: &str,
        _caption: &str,
    ) -> BoxFuture<'_, Result<()>> {
        let session_id = self.session_id.clone();
        let address = address.to_owned();
        let filename = filename.to_owned();
        let bytes = payload.len();
        Box::pin(async move {
            if bytes == 0 {
                return Err(AppError::Transport("document payload is empty".into()));
            }
            info!(session_id = %session_id, address = %address, filename = %filename, bytes, "dev transport document send");
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        let session_id = self.session_id.clone();
        let events = self.events.clone();
        Box::pin(async move {
            debug!(session_id = %session_id, "dev transport closing");
            // A graceful close emits no Closed event: the supervisor tears
            // the pump down first, mirroring listener removal before close.
            drop(events);
            Ok(())
        })
    }
}
