use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

const TOKEN_CONTEXT: &str = "quill session token v1";

/// Opaque session identifier handed to a client after login.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens are credentials; never print them in full.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "SessionToken({prefix}..)")
    }
}

/// Server-side record of an authenticated session.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    pub created_at: DateTime<Utc>,
}

/// Tracks which session tokens are currently authenticated.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a new token and mark it authenticated.
    async fn create(&self) -> ServerResult<SessionToken>;

    /// Returns `true` if the token belongs to a live session.
    async fn validate(&self, token: &SessionToken) -> ServerResult<bool>;

    /// End a session. Returns `true` if it was live.
    async fn revoke(&self, token: &SessionToken) -> ServerResult<bool>;

    /// Number of live sessions.
    async fn len(&self) -> ServerResult<usize>;
}

/// Process-lifetime session store. Sessions never expire; they end on
/// logout or restart.
pub struct InMemorySessionStore {
    key: [u8; 32],
    sessions: RwLock<HashMap<SessionToken, SessionRecord>>,
}

impl InMemorySessionStore {
    /// Create a store whose tokens are keyed by `secret`.
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(TOKEN_CONTEXT, secret.as_bytes()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// 64 hex characters: keyed BLAKE3 over fresh randomness and the issue time.
    fn mint(&self, now: DateTime<Utc>) -> SessionToken {
        let mut nonce = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut nonce);
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&nonce);
        hasher.update(&now.timestamp_micros().to_le_bytes());
        SessionToken(hex::encode(hasher.finalize().as_bytes()))
    }
}

fn poisoned() -> ServerError {
    ServerError::Internal("session lock poisoned".into())
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> ServerResult<SessionToken> {
        let now = Utc::now();
        let token = self.mint(now);
        self.sessions
            .write()
            .map_err(|_| poisoned())?
            .insert(token.clone(), SessionRecord { created_at: now });
        Ok(token)
    }

    async fn validate(&self, token: &SessionToken) -> ServerResult<bool> {
        Ok(self.sessions.read().map_err(|_| poisoned())?.contains_key(token))
    }

    async fn revoke(&self, token: &SessionToken) -> ServerResult<bool> {
        Ok(self
            .sessions
            .write()
            .map_err(|_| poisoned())?
            .remove(token)
            .is_some())
    }

    async fn len(&self) -> ServerResult<usize> {
        Ok(self.sessions.read().map_err(|_| poisoned())?.len())
    }
}

impl fmt::Debug for InMemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.sessions.read().map(|s| s.len()).unwrap_or_default();
        f.debug_struct("InMemorySessionStore")
            .field("session_count", &count)
            .finish()
    }
}
