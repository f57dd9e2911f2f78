//! Authenticated session payload and the collaborators that receive it.
//!
//! When a login attempt succeeds, the identity service returns a
//! [`SessionDescriptor`]. The authentication flow does not interpret it; it
//! hands it to a [`SessionStore`] (durable persistence) and then to a
//! [`SessionBroadcast`] (notifies whoever else shares the session, e.g. other
//! tasks in the same process).

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{AuthError, Result};

// ── Descriptor types ────────────────────────────────────────────────────

/// Final payload of a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Token, user and primary account of the session.
    pub authentication: Authentication,

    /// Account the user is acting as, when different from their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting: Option<Account>,

    /// Location the session is pinned to, if any.
    #[serde(
        rename = "boundLocationId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bound_location_id: Option<String>,
}

/// The `authentication` object of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authentication {
    /// Authenticated user.
    pub user: User,
    /// The user's primary account.
    pub account: Account,
    /// Access token for subsequent API calls (`X-AIMS-Auth-Token`).
    pub token: String,
    /// Unix timestamp (seconds) at which `token` expires.
    pub token_expiration: i64,
}

/// A user record as embedded in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Account the user belongs to.
    #[serde(default)]
    pub account_id: Option<String>,
    /// Display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Whether the user is enabled.
    #[serde(default)]
    pub active: Option<bool>,
    /// Whether the user is locked out.
    #[serde(default)]
    pub locked: Option<bool>,
}

/// An account record as embedded in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID (eight-digit string).
    #[serde(default)]
    pub id: Option<String>,
    /// Account name.
    pub name: String,
    /// Whether the account is enabled.
    #[serde(default)]
    pub active: bool,
    /// Location IDs the account's data may live in.
    #[serde(default)]
    pub accessible_locations: Vec<String>,
    /// Location new data goes to by default.
    #[serde(default)]
    pub default_location: Option<String>,
    /// Whether every user of the account must use MFA.
    #[serde(default)]
    pub mfa_required: Option<bool>,
}

// ── Collaborator traits ─────────────────────────────────────────────────

/// Durable home for the authenticated session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists `session`, replacing whatever was stored before.
    async fn set_authentication(&self, session: &SessionDescriptor) -> Result<()>;
}

/// Secondary channel told about every newly established session.
#[async_trait]
pub trait SessionBroadcast: Send + Sync {
    /// Announces `session` to listeners.
    async fn set_session(&self, session: &SessionDescriptor) -> Result<()>;
}

// ── Implementations ─────────────────────────────────────────────────────

/// Keeps the most recent session in memory.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    current: Mutex<Option<SessionDescriptor>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored session, if any.
    pub fn current(&self) -> Option<SessionDescriptor> {
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set_authentication(&self, session: &SessionDescriptor) -> Result<()> {
        *self
            .current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }
}

/// Writes the session as pretty-printed JSON to a file.
///
/// Parent directories are created on first write. The file is overwritten
/// on every successful login.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Creates a store that writes to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore { path: path.into() }
    }

    /// Reads back a previously stored session.
    pub async fn load(&self) -> Result<SessionDescriptor> {
        let content = tokio::fs::read(&self.path).await.map_err(|e| AuthError::Session {
            message: format!("reading {}", self.path.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(serde_json::from_slice(&content)?)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn set_authentication(&self, session: &SessionDescriptor) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Session {
                    message: format!("creating {}", parent.display()),
                    source: Some(Box::new(e)),
                })?;
        }

        let json = serde_json::to_vec_pretty(session)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuthError::Session {
                message: format!("writing {}", self.path.display()),
                source: Some(Box::new(e)),
            })
    }
}

/// Publishes sessions on a `tokio::sync::broadcast` channel.
///
/// Having no subscribers at the time of a login is not an error; the
/// session is simply not delivered to anyone.
#[derive(Debug, Clone)]
pub struct ChannelBroadcast {
    sender: broadcast::Sender<SessionDescriptor>,
}

impl ChannelBroadcast {
    /// Creates a channel that buffers up to `capacity` undelivered sessions
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        ChannelBroadcast { sender }
    }

    /// Registers a new listener.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionDescriptor> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl SessionBroadcast for ChannelBroadcast {
    async fn set_session(&self, session: &SessionDescriptor) -> Result<()> {
        let delivered = self.sender.send(session.clone()).unwrap_or(0);
        tracing::debug!(subscribers = delivered, "session broadcast");
        Ok(())
    }
}

/// Broadcast that goes nowhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBroadcast;

#[async_trait]
impl SessionBroadcast for NoopBroadcast {
    async fn set_session(&self, _session: &SessionDescriptor) -> Result<()> {
        Ok(())
    }
}
