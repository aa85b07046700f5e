//! Credential store: one directory per session id.
//!
//! Layout: `<session_root>/<id>/creds.json`. Presence of the file is
//! necessary but not sufficient for "authenticated" — the material must also
//! carry a populated identity. That distinction drives restore-on-startup
//! and the status route's auto-reconnect decision.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{AppError, Result};

/// File name holding serialized credentials inside a session directory.
const CREDS_FILE: &str = "creds.json";

/// Serialized authentication material for one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CredentialMaterial {
    /// Authenticated account identifier; `None` until pairing completes.
    pub identity: Option<String>,
    /// Opaque key material owned by the transport.
    #[serde(default)]
    pub keys: serde_json::Value,
    /// When this material was last written.
    pub updated_at: DateTime<Utc>,
}

impl CredentialMaterial {
    /// Material for a freshly provisioned, not-yet-paired session.
    #[must_use]
    pub fn provisioned() -> Self {
        Self {
            identity: None,
            keys: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }

    /// Material for a completed pairing.
    #[must_use]
    pub fn paired(identity: String) -> Self {
        Self {
            identity: Some(identity),
            keys: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }
}

/// On-disk credential store rooted at a configurable directory.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Build a store rooted at `root`. No I/O happens here.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured session root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one session's material.
    #[must_use]
    pub fn session_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn creds_file(&self, id: &str) -> PathBuf {
        self.session_dir(id).join(CREDS_FILE)
    }

    /// Create the session root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Create one session's directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created.
    pub fn ensure_session_dir(&self, id: &str) -> Result<()> {
        fs::create_dir_all(self.session_dir(id))?;
        Ok(())
    }

    /// Whether any on-disk material exists for `id`, valid or not.
    #[must_use]
    pub fn exists(&self, id: &str) -> bool {
        self.creds_file(id).is_file()
    }

    /// Load stored material for `id`.
    ///
    /// Malformed JSON on disk is treated as not-authenticated: it is logged
    /// and reported as `Ok(None)`, never as a hard failure.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the file exists but cannot be read.
    pub fn load(&self, id: &str) -> Result<Option<CredentialMaterial>> {
        let path = self.creds_file(id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(material) => Ok(Some(material)),
            Err(err) => {
                warn!(session_id = %id, %err, "malformed credential file, treating as unauthenticated");
                Ok(None)
            }
        }
    }

    /// Persist material for `id`, creating the session directory as needed.
    ///
    /// This is the credential-persistence callback surface handed to the
    /// transport: invoked whenever material changes.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Credentials` if serialization fails, or
    /// `AppError::Io` if the file cannot be written.
    pub fn store(&self, id: &str, material: &CredentialMaterial) -> Result<()> {
        self.ensure_session_dir(id)?;
        let raw = serde_json::to_string_pretty(material)
            .map_err(|err| AppError::Credentials(format!("serialize credentials: {err}")))?;
        fs::write(self.creds_file(id), raw)?;
        Ok(())
    }

    /// The authenticity predicate: material present AND identity populated.
    #[must_use]
    pub fn has_valid(&self, id: &str) -> bool {
        matches!(self.load(id), Ok(Some(material)) if material.identity.is_some())
    }

    /// Erase all persisted material for `id` (logout, deletion).
    ///
    /// Removing an absent directory is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory exists but cannot be removed.
    pub fn wipe(&self, id: &str) -> Result<()> {
        match fs::remove_dir_all(self.session_dir(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Session ids with a plausible credential file on disk.
    ///
    /// Used by the startup restorer; non-directory entries and directories
    /// without a credential file are skipped.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the session root cannot be enumerated.
    pub fn list_candidates(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(out),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(id) = entry.file_name().into_string() else {
                continue;
            };
            if self.exists(&id) {
                out.push(id);
            }
        }
        out.sort();
        Ok(out)
    }
}
