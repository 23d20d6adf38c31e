use std::sync::Arc;

use quill_store::{InMemoryPostStore, JsonFilePostStore, PostStore, StoreResult};

use crate::auth::{Caller, CredentialVerifier, StaticCredentials};
use crate::config::{ServerConfig, StorageBackend};
use crate::error::{ApiError, ApiResult, ServerResult};
use crate::policy::Operation;
use crate::session::{InMemorySessionStore, SessionStore};
use crate::upload::UploadStore;

/// Shared handles injected into every request handler.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub credentials: Arc<dyn CredentialVerifier>,
    pub uploads: Arc<UploadStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Build the default wiring for `config`: store backend per
    /// `config.storage`, in-memory sessions, static credentials.
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let posts: Arc<dyn PostStore> = match config.storage {
            StorageBackend::Memory => Arc::new(InMemoryPostStore::new()),
            StorageBackend::JsonFile => Arc::new(JsonFilePostStore::open(&config.data_dir)?),
        };
        Ok(Self::with_store(config, posts))
    }

    /// Wire the state around an existing post store.
    pub fn with_store(config: ServerConfig, posts: Arc<dyn PostStore>) -> Self {
        Self {
            posts,
            sessions: Arc::new(InMemorySessionStore::new(&config.session_secret)),
            credentials: Arc::new(StaticCredentials::from(&config.admin)),
            uploads: Arc::new(UploadStore::new(config.upload_dir.clone())),
            config: Arc::new(config),
        }
    }

    /// Replace the credential verifier.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Fail with an auth error when `op` needs a session the caller lacks.
    pub fn authorize(&self, op: Operation, caller: &Caller) -> ApiResult<()> {
        if self.config.policy.requires_session(op) && !caller.is_authenticated() {
            return Err(ApiError::Auth(format!("login required to {op} posts")));
        }
        Ok(())
    }

    /// Run a store operation on the blocking pool. File-backed stores write
    /// to disk while holding their lock.
    pub async fn store<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn PostStore) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let posts = Arc::clone(&self.posts);
        tokio::task::spawn_blocking(move || f(posts.as_ref()))
            .await
            .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
            .map_err(ApiError::from)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.config.storage)
            .field("upload_dir", &self.uploads.dir())
            .finish()
    }
}
