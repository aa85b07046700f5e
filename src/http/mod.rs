//! HTTP API surface.
//!
//! Mounts the caller-facing routes behind an axum router. Handlers never
//! mutate session records directly — they go through the supervisor, the
//! evictor, and the registry's read-only surface.

pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::persistence::creds::CredentialStore;
use crate::registry::SessionRegistry;
use crate::supervisor::evictor::IdleEvictor;
use crate::supervisor::Supervisor;
use crate::{AppError, Result};

/// Shared application state injected into every route handler.
pub struct AppState {
    /// Global configuration.
    pub config: Arc<GlobalConfig>,
    /// Session lifecycle orchestrator.
    pub supervisor: Arc<Supervisor>,
    /// Idle-disconnect scheduler.
    pub evictor: Arc<IdleEvictor>,
    /// Shared session registry (read-only from this layer).
    pub registry: Arc<SessionRegistry>,
    /// On-disk credential store (read-only from this layer).
    pub creds: Arc<CredentialStore>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ReservedSession(_) | Self::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            Self::NotConnected(_) => StatusCode::CONFLICT,
            Self::PairingTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::RetriesExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Config(_) | Self::Transport(_) | Self::Credentials(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Build the API router over shared state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/connect/{id}", get(routes::connect))
        .route("/api/status/{id}", get(routes::status))
        .route("/api/send/{id}", post(routes::send))
        .route("/api/send-document/{id}", post(routes::send_document))
        .route("/api/keep-alive/{id}", post(routes::keep_alive))
        .route("/api/sessions", get(routes::sessions))
        .route("/api/delete/{id}", delete(routes::delete_session))
        .route("/api/health", get(routes::health))
        .with_state(state)
}

/// Bind and serve the HTTP API until the token fires.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener cannot bind, or
/// `AppError::Io` if serving fails.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let port = state.config.http_port;
    let bind = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Config(format!("cannot bind {bind}: {err}")))?;
    info!(%bind, "HTTP API listening");

    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;
    Ok(())
}
