use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};
use thiserror::Error;

use crate::{error::ConsoleError, models::Principal};

/// Session
///
/// The authenticated identity held by the console: an opaque bearer token paired
/// with the principal it was issued for. The pair is one value, so it is always
/// written and cleared together and a half-present session cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    principal: Principal,
}

impl Session {
    /// new
    ///
    /// Builds a session from a freshly issued token. An empty token is refused:
    /// it could never authorize a call.
    pub fn new(token: impl Into<String>, principal: Principal) -> Result<Self, ConsoleError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConsoleError::Validation(
                "the identity service returned an empty token".to_string(),
            ));
        }
        Ok(Self { token, principal })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// SessionStoreError
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session cache io error: {0}")]
    Io(#[from] io::Error),
    #[error("session cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<SessionStoreError> for ConsoleError {
    fn from(err: SessionStoreError) -> Self {
        ConsoleError::Storage(err.to_string())
    }
}

/// SessionStore
///
/// The key-value persistence surface for the session. Implementations must
/// replace or remove the token/principal pair as a unit.
pub trait SessionStore: Send + Sync {
    /// Returns the stored session, or `None` when nothing complete is stored.
    fn load(&self) -> Result<Option<Session>, SessionStoreError>;
    /// Replaces whatever is stored with `session`.
    fn persist(&self, session: &Session) -> Result<(), SessionStoreError>;
    /// Removes the stored session. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// SessionState
///
/// Shared handle to the session store, read by the guard and the account manager's
/// calls and written by login and the invalidation path.
pub type SessionState = Arc<dyn SessionStore>;

// --- In-memory store ---

/// MemorySessionStore
///
/// Process-lifetime session cache. Used by tests and by hosts that re-authenticate
/// on every start.
#[derive(Default)]
pub struct MemorySessionStore {
    slot: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let slot = self.slot.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(slot.clone())
    }

    fn persist(&self, session: &Session) -> Result<(), SessionStoreError> {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut slot = self.slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
        Ok(())
    }
}

// --- File-backed store ---

/// StoredSession
///
/// On-disk document. Both keys are optional at the serde level so that a
/// document missing one of them can be detected and discarded.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<Principal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stored_at: Option<DateTime<Utc>>,
}

/// FileSessionStore
///
/// Persists the session as a single JSON document holding the `token` and `user`
/// keys. Writes go to a temporary sibling which is then renamed over the target,
/// so a reader sees either the old pair or the new pair.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn discard(&self, reason: &str) -> Result<Option<Session>, SessionStoreError> {
        tracing::warn!(path = %self.path.display(), "discarding session cache: {}", reason);
        self.clear()?;
        Ok(None)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSession = match serde_json::from_slice(&raw) {
            Ok(stored) => stored,
            Err(_) => return self.discard("malformed document"),
        };

        match (stored.token, stored.user) {
            (Some(token), Some(principal)) if !token.trim().is_empty() => {
                Ok(Some(Session { token, principal }))
            }
            (Some(_), Some(_)) => self.discard("empty token"),
            (Some(_), None) => self.discard("token without principal"),
            (None, Some(_)) => self.discard("principal without token"),
            (None, None) => self.discard("empty document"),
        }
    }

    fn persist(&self, session: &Session) -> Result<(), SessionStoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let document = StoredSession {
            token: Some(session.token.clone()),
            user: Some(session.principal.clone()),
            stored_at: Some(Utc::now()),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        // The document holds a bearer token: owner-only on Unix.
        let temp = self.temp_path();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&temp)?;
        // A temp file left by an earlier crash keeps its old mode; reset it.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(&bytes)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &self.path)?;

        tracing::debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
