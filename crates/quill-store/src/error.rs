use std::path::PathBuf;

use quill_types::PostId;

/// Errors from post store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A post with this id is already stored.
    #[error("duplicate post id: {0}")]
    DuplicateId(PostId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing document file exists but cannot be decoded.
    #[error("corrupt document file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
