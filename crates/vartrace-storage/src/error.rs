//! Storage error types for vartrace-storage.

use thiserror::Error;

use crate::types::ArtifactKey;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No artifact is stored under the key.
    #[error("artifact not found: {0}")]
    NotFound(ArtifactKey),

    /// The key cannot be stored by this backend.
    #[error("invalid artifact key {key}: {reason}")]
    InvalidKey { key: ArtifactKey, reason: String },

    /// The backing filesystem failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
