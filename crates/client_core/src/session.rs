//! Credential cache shared by the request layer and the task board.
//!
//! Loaded once at startup from the session file, replaced on login, and torn
//! down when the backend answers 401.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::{domain::UserId, protocol::AuthResponse};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "_id")]
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub token: String,
}

impl From<AuthResponse> for Session {
    fn from(value: AuthResponse) -> Self {
        Self {
            user_id: value.user_id,
            name: value.name,
            email: value.email,
            token: value.token,
        }
    }
}

/// JSON file holding the persisted session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read session file '{}'", self.path.display())
                })
            }
        };
        let session = serde_json::from_str(&raw).with_context(|| {
            format!("failed to parse session file '{}'", self.path.display())
        })?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create parent directory '{}' for session file",
                    parent.display()
                )
            })?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw).with_context(|| {
            format!("failed to write session file '{}'", self.path.display())
        })
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove session file '{}'", self.path.display())
            }),
        }
    }
}

pub struct SessionContext {
    store: Option<SessionStore>,
    current: RwLock<Option<Session>>,
    authenticated: watch::Sender<bool>,
}

impl SessionContext {
    /// Session that lives only in memory.
    pub fn in_memory(session: Option<Session>) -> Self {
        Self::with_store(None, session)
    }

    /// Loads the persisted session; an unreadable file counts as signed out.
    pub fn load(store: SessionStore) -> Self {
        let session = match store.load() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %format_args!("{err:#}"), "session: ignoring unreadable session file");
                None
            }
        };
        if let Some(session) = &session {
            info!(user_id = %session.user_id, email = %session.email, "session: restored");
        }
        Self::with_store(Some(store), session)
    }

    fn with_store(store: Option<SessionStore>, session: Option<Session>) -> Self {
        let (authenticated, _) = watch::channel(session.is_some());
        Self {
            store,
            current: RwLock::new(session),
            authenticated,
        }
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.current
            .read()
            .await
            .as_ref()
            .map(|session| session.token.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Replaces the current session and persists it.
    pub async fn establish(&self, session: Session) -> Result<()> {
        if let Some(store) = &self.store {
            store.save(&session)?;
        }
        info!(user_id = %session.user_id, "session: established");
        *self.current.write().await = Some(session);
        self.authenticated.send_replace(true);
        Ok(())
    }

    /// Explicit sign-out.
    pub async fn clear(&self) -> Result<()> {
        *self.current.write().await = None;
        self.authenticated.send_replace(false);
        if let Some(store) = &self.store {
            store.clear()?;
        }
        Ok(())
    }

    /// Teardown after the backend rejected the credential.
    pub async fn expire(&self) {
        let previous = self.current.write().await.take();
        if let Some(previous) = previous {
            warn!(user_id = %previous.user_id, "session: expired");
        }
        self.authenticated.send_replace(false);
        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                warn!(error = %format_args!("{err:#}"), "session: failed to clear expired session");
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.authenticated.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
