#![forbid(unsafe_code)]

//! `chatwarden` — messaging session supervisor binary.
//!
//! Bootstraps configuration, the shared registry and credential store, the
//! HTTP API, the eviction consumer, and the fire-and-forget startup restore.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use chatwarden::config::GlobalConfig;
use chatwarden::http::{self, AppState};
use chatwarden::persistence::creds::CredentialStore;
use chatwarden::registry::SessionRegistry;
use chatwarden::supervisor::evictor::{spawn_eviction_consumer, IdleEvictor};
use chatwarden::supervisor::{restore, Supervisor};
use chatwarden::transport::dev::DevTransport;
use chatwarden::transport::Transport;
use chatwarden::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "chatwarden", about = "Messaging session supervisor", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the session root directory.
    #[arg(long)]
    session_root: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("chatwarden server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = match args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(root) = args.session_root {
        config.session_root = root;
    }
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Build shared application state ──────────────────
    let creds = Arc::new(CredentialStore::new(config.session_root.clone()));
    creds.ensure_root()?;

    let registry = Arc::new(SessionRegistry::new());
    let transport: Arc<dyn Transport> = Arc::new(DevTransport::new(
        config.transport.auto_pair,
        Duration::from_millis(config.transport.auto_pair_delay_ms),
    ));
    let supervisor = Arc::new(Supervisor::new(
        Arc::clone(&config),
        Arc::clone(&registry),
        Arc::clone(&creds),
        transport,
    ));

    let (evictor, fired_rx) = IdleEvictor::new();
    let evictor = Arc::new(evictor);

    let ct = CancellationToken::new();
    let eviction_handle = spawn_eviction_consumer(fired_rx, Arc::clone(&supervisor), ct.clone());
    info!("eviction consumer started");

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        supervisor: Arc::clone(&supervisor),
        evictor,
        registry,
        creds,
    });

    // ── Start HTTP API, then restore persisted sessions ─
    let http_ct = ct.clone();
    let http_state = Arc::clone(&state);
    let http_handle = tokio::spawn(async move {
        if let Err(err) = http::serve(http_state, http_ct).await {
            error!(%err, "HTTP API failed");
        }
    });

    // Restore runs fire-and-forget: process readiness never waits on it.
    if config.restore.enabled {
        let _restore_handle = restore::spawn_restore(
            Arc::clone(&supervisor),
            config.restore_stagger(),
        );
        info!("startup restore dispatched");
    }

    info!("chatwarden ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    let _ = tokio::join!(http_handle, eviction_handle);
    info!("chatwarden shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
