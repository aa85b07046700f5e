//! Global configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Reconnection policy knobs for the exponential backoff schedule.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReconnectConfig {
    /// Base delay before the first automatic retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Saturation cap for the backoff schedule.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Automatic retries allowed before a session is considered failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    3000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Bounded-wait knobs for the pairing protocol exposed on the connect route.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PairingConfig {
    /// Interval between polls of the session record during a pairing wait.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Total time a caller blocks waiting for a pairing code or connection.
    #[serde(default = "default_wait_timeout_seconds")]
    pub wait_timeout_seconds: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_wait_timeout_seconds() -> u64 {
    30
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            wait_timeout_seconds: default_wait_timeout_seconds(),
        }
    }
}

/// Inactivity eviction knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct IdleConfig {
    /// Quiet period after which an armed session is disconnected.
    #[serde(default = "default_quiet_minutes")]
    pub quiet_minutes: u64,
}

fn default_quiet_minutes() -> u64 {
    5
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            quiet_minutes: default_quiet_minutes(),
        }
    }
}

/// Startup restore knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct RestoreConfig {
    /// Whether persisted sessions are reconnected at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Fixed delay between successive restore attempts.
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_stagger_ms() -> u64 {
    2000
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            stagger_ms: default_stagger_ms(),
        }
    }
}

/// Development transport knobs.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TransportConfig {
    /// Whether the dev transport completes pairing on its own after a delay.
    #[serde(default)]
    pub auto_pair: bool,
    /// Delay before the dev transport reports a self-completed pairing.
    #[serde(default = "default_auto_pair_delay_ms")]
    pub auto_pair_delay_ms: u64,
}

fn default_auto_pair_delay_ms() -> u64 {
    1500
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            auto_pair: false,
            auto_pair_delay_ms: default_auto_pair_delay_ms(),
        }
    }
}

fn default_session_root() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_http_port() -> u16 {
    3006
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Root directory holding one credential directory per session id.
    #[serde(default = "default_session_root")]
    pub session_root: PathBuf,
    /// Port the HTTP API listens on.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Reconnection backoff schedule.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Pairing bounded-wait behavior.
    #[serde(default)]
    pub pairing: PairingConfig,
    /// Inactivity eviction behavior.
    #[serde(default)]
    pub idle: IdleConfig,
    /// Startup restore behavior.
    #[serde(default)]
    pub restore: RestoreConfig,
    /// Development transport behavior.
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            session_root: default_session_root(),
            http_port: default_http_port(),
            reconnect: ReconnectConfig::default(),
            pairing: PairingConfig::default(),
            idle: IdleConfig::default(),
            restore: RestoreConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Base reconnect delay as a `Duration`.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.base_delay_ms)
    }

    /// Reconnect delay cap as a `Duration`.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.max_delay_ms)
    }

    /// Pairing poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.pairing.poll_interval_ms)
    }

    /// Pairing wait timeout as a `Duration`.
    #[must_use]
    pub fn pairing_timeout(&self) -> Duration {
        Duration::from_secs(self.pairing.wait_timeout_seconds)
    }

    /// Idle quiet period as a `Duration`.
    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.idle.quiet_minutes * 60)
    }

    /// Delay between startup restore attempts as a `Duration`.
    #[must_use]
    pub fn restore_stagger(&self) -> Duration {
        Duration::from_millis(self.restore.stagger_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.reconnect.max_attempts == 0 {
            return Err(AppError::Config(
                "reconnect.max_attempts must be greater than zero".into(),
            ));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(AppError::Config(
                "reconnect.base_delay_ms must be greater than zero".into(),
            ));
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(AppError::Config(
                "reconnect.max_delay_ms must not be below reconnect.base_delay_ms".into(),
            ));
        }
        if self.pairing.poll_interval_ms == 0 {
            return Err(AppError::Config(
                "pairing.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.idle.quiet_minutes == 0 {
            return Err(AppError::Config(
                "idle.quiet_minutes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
