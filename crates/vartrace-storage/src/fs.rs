//! Filesystem implementation of [`ArtifactStore`].
//!
//! One file per artifact, named `<owner><suffix>` inside a single
//! directory (see [`ArtifactKind::suffix`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use vartrace_core::CodeId;

use crate::error::StorageError;
use crate::traits::ArtifactStore;
use crate::types::{ArtifactKey, ArtifactKind};

/// Artifacts stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;
        tracing::debug!(dir = %dir.display(), "opened artifact store");
        Ok(FsStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ArtifactStore for FsStore {
    fn put(&mut self, key: &ArtifactKey, content: &str) -> Result<(), StorageError> {
        key.validate()?;
        let path = self.path_of(key);
        // Write beside the target and rename so readers never see a
        // half-written artifact.
        let staging = self.dir.join(format!(".{}.tmp", key.file_name()));
        fs::write(&staging, content).map_err(|source| io_error(&staging, source))?;
        fs::rename(&staging, &path).map_err(|source| io_error(&path, source))?;
        tracing::debug!(artifact = %key, bytes = content.len(), "stored artifact");
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<String, StorageError> {
        key.validate()?;
        let path = self.path_of(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.clone()))
            }
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError> {
        key.validate()?;
        Ok(self.path_of(key).is_file())
    }

    fn delete(&mut self, key: &ArtifactKey) -> Result<bool, StorageError> {
        key.validate()?;
        let path = self.path_of(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn list_codes(&self) -> Result<Vec<CodeId>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| io_error(&self.dir, source))?;
        let source_suffix = ArtifactKind::Source.suffix();
        let instrumented_suffix = ArtifactKind::Instrumented.suffix();
        let mut codes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.dir, source))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(instrumented_suffix) {
                continue;
            }
            if let Some(owner) = name.strip_suffix(source_suffix) {
                if let Ok(code) = CodeId::parse(owner) {
                    codes.push(code);
                }
            }
        }
        codes.sort();
        Ok(codes)
    }
}

fn io_error(path: &Path, source: io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        source,
    }
}
