//! Route handlers for the session API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::session::{SessionState, SessionSummary};
use crate::supervisor::pairing::{self, PairingOutcome};
use crate::{AppError, Result};

use super::AppState;

/// Response body for the connect route.
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    /// Whether the session is connected.
    pub connected: bool,
    /// Pairing code to present out-of-band, when one was issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
    /// Human-readable status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /api/connect/{id}` — ensure a connection attempt and block for its
/// pairing code (or connection) within the configured wait window.
///
/// # Errors
///
/// Returns [`AppError::PairingTimeout`] when the wait window elapses, or
/// [`AppError::RetriesExhausted`] when the session is failed.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConnectResponse>> {
    let handle = state.registry.get(&id);

    match handle.state() {
        SessionState::Connected => {
            return Ok(Json(ConnectResponse {
                connected: true,
                pairing_code: None,
                message: Some(format!("session {id} is already connected")),
            }));
        }
        SessionState::Connecting if handle.connect_in_flight() => {
            return Ok(Json(ConnectResponse {
                connected: true,
                pairing_code: None,
                message: Some(format!("session {id} is already connecting")),
            }));
        }
        _ => {}
    }

    // A stored, unconsumed pairing code is served without a new attempt.
    if let Some(code) = handle.pairing_code() {
        return Ok(Json(ConnectResponse {
            connected: false,
            pairing_code: Some(code),
            message: None,
        }));
    }

    info!(session_id = %id, "initiating connection for pairing");
    state.supervisor.spawn_connect(&id);

    let outcome = pairing::wait_for_pairing(
        &state.registry,
        &id,
        state.config.pairing_timeout(),
        state.config.poll_interval(),
    )
    .await?;

    match outcome {
        PairingOutcome::Code(code) => Ok(Json(ConnectResponse {
            connected: false,
            pairing_code: Some(code),
            message: None,
        })),
        PairingOutcome::Connected { .. } => Ok(Json(ConnectResponse {
            connected: true,
            pairing_code: None,
            message: Some(format!("session {id} connected successfully")),
        })),
    }
}

/// Response body for the status route.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Session identifier.
    pub id: String,
    /// Whether the session is connected.
    pub connected: bool,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Whether valid credentials are persisted on disk.
    pub credentials_on_disk: bool,
    /// Whether this query triggered a background reconnect.
    pub auto_reconnecting: bool,
}

/// `GET /api/status/{id}` — report state; lazily reconnect a disconnected
/// session that has valid credentials on disk.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<StatusResponse> {
    let report = state.supervisor.status(&id);
    Json(StatusResponse {
        id: report.id,
        connected: report.connected,
        state: report.state,
        credentials_on_disk: report.credentials_on_disk,
        auto_reconnecting: report.auto_reconnecting,
    })
}

/// Request body for the send route.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Destination address.
    pub to: String,
    /// Message text.
    pub message: String,
}

/// Response body for successful send operations.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    /// Always `true` on success.
    pub success: bool,
}

/// `POST /api/send/{id}` — send a text message from a connected session.
///
/// # Errors
///
/// Returns [`AppError::NotConnected`] unless the session is connected, or
/// [`AppError::NotFound`] when the address is not on the network.
pub async fn send(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>> {
    state
        .supervisor
        .send_text(&id, &req.to, &req.message)
        .await?;
    state
        .evictor
        .mark_activity(&id, state.config.quiet_period());
    Ok(Json(SendResponse { success: true }))
}

/// Request body for the send-document route.
#[derive(Debug, Deserialize)]
pub struct SendDocumentRequest {
    /// Destination address.
    pub to: String,
    /// Optional caption text.
    #[serde(default)]
    pub message: Option<String>,
    /// Base64 `data:` URL carrying the document payload.
    pub document_data: String,
    /// Filename presented to the recipient.
    pub filename: String,
}

/// `POST /api/send-document/{id}` — send a document from a connected session.
///
/// # Errors
///
/// Returns [`AppError::InvalidPayload`] when `document_data` is not a
/// decodable base64 `data:` URL, plus the same failure modes as [`send`].
pub async fn send_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SendDocumentRequest>,
) -> Result<Json<SendResponse>> {
    let payload = decode_data_url(&req.document_data)?;
    let caption = req.message.unwrap_or_default();
    state
        .supervisor
        .send_document(&id, &req.to, payload, &req.filename, &caption)
        .await?;
    state
        .evictor
        .mark_activity(&id, state.config.quiet_period());
    Ok(Json(SendResponse { success: true }))
}

/// Response body for the keep-alive route.
#[derive(Debug, Serialize)]
pub struct KeepAliveResponse {
    /// Always `true` on success.
    pub success: bool,
    /// Session identifier.
    pub id: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Human-readable summary of the armed eviction deadline.
    pub message: String,
}

/// `POST /api/keep-alive/{id}` — reconnect if needed and (re)arm the idle
/// disconnect timer for the configured quiet period.
///
/// # Errors
///
/// Returns [`AppError::NotFound`] when no credentials exist on disk — the
/// session must be paired before it can be kept alive.
pub async fn keep_alive(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<KeepAliveResponse>> {
    if !state.creds.exists(&id) {
        return Err(AppError::NotFound(format!(
            "no stored session for {id}; scan a pairing code first"
        )));
    }

    let current = state
        .registry
        .peek(&id)
        .map_or(SessionState::Disconnected, |h| h.state());
    if current == SessionState::Disconnected && state.creds.has_valid(&id) {
        info!(session_id = %id, "keep-alive reconnecting idle session");
        state.supervisor.spawn_connect(&id);
    }

    let quiet = state.config.quiet_period();
    state.evictor.schedule(&id, quiet);

    let snapshot = state
        .registry
        .peek(&id)
        .map_or(SessionState::Disconnected, |h| h.state());
    Ok(Json(KeepAliveResponse {
        success: true,
        id,
        state: snapshot,
        message: format!(
            "session will disconnect after {} minutes of inactivity",
            state.config.idle.quiet_minutes
        ),
    }))
}

/// Response body for the sessions list route.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    /// One summary per registered session.
    pub sessions: Vec<SessionSummary>,
}

/// `GET /api/sessions` — list every registered session.
pub async fn sessions(State(state): State<Arc<AppState>>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.registry.list(),
    })
}

/// `DELETE /api/delete/{id}` — tear down and erase a session.
///
/// # Errors
///
/// Returns [`AppError::ReservedSession`] for the reserved id, or
/// [`AppError::NotFound`] when nothing exists to delete.
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.evictor.cancel(&id);
    state.supervisor.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/health` — liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Decode a `data:<mime>;base64,<payload>` URL into raw bytes.
fn decode_data_url(data: &str) -> Result<Bytes> {
    let Some((header, payload)) = data.split_once(',') else {
        return Err(AppError::InvalidPayload(
            "document_data must be a base64 data: URL".into(),
        ));
    };
    if !data.starts_with("data:") || !header.ends_with(";base64") {
        return Err(AppError::InvalidPayload(
            "document_data must be a base64 data: URL".into(),
        ));
    }
    let decoded = BASE64_STANDARD
        .decode(payload.trim())
        .map_err(|err| AppError::InvalidPayload(format!("document_data is not valid base64: {err}")))?;
    Ok(Bytes::from(decoded))
}
