//! The [`ArtifactStore`] trait defining the storage contract for artifacts.
//!
//! All backends (InMemoryStore, FsStore) implement this trait, so the
//! service can swap them without changing its logic.

use vartrace_core::CodeId;

use crate::error::StorageError;
use crate::types::ArtifactKey;

/// The storage contract for program and run artifacts.
///
/// The trait is synchronous; callers serialize access the way they need to.
pub trait ArtifactStore {
    /// Stores `content` under `key`, replacing any previous artifact.
    fn put(&mut self, key: &ArtifactKey, content: &str) -> Result<(), StorageError>;

    /// Reads the artifact under `key`.
    ///
    /// Returns [`StorageError::NotFound`] when nothing is stored there.
    fn get(&self, key: &ArtifactKey) -> Result<String, StorageError>;

    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError>;

    /// Removes the artifact under `key`. Returns whether one was removed.
    fn delete(&mut self, key: &ArtifactKey) -> Result<bool, StorageError>;

    /// Ids of all programs with a stored source, sorted.
    fn list_codes(&self) -> Result<Vec<CodeId>, StorageError>;
}
