//! In-memory implementation of [`ArtifactStore`].
//!
//! [`InMemoryStore`] is a first-class backend for tests and one-shot CLI
//! sessions. It keeps artifacts in a map with the same semantics as
//! [`FsStore`](crate::fs::FsStore).

use std::collections::BTreeMap;

use vartrace_core::CodeId;

use crate::error::StorageError;
use crate::traits::ArtifactStore;
use crate::types::{ArtifactKey, ArtifactKind};

/// Artifacts held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    artifacts: BTreeMap<ArtifactKey, String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactStore for InMemoryStore {
    fn put(&mut self, key: &ArtifactKey, content: &str) -> Result<(), StorageError> {
        key.validate()?;
        self.artifacts.insert(key.clone(), content.to_string());
        Ok(())
    }

    fn get(&self, key: &ArtifactKey) -> Result<String, StorageError> {
        self.artifacts
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.clone()))
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool, StorageError> {
        Ok(self.artifacts.contains_key(key))
    }

    fn delete(&mut self, key: &ArtifactKey) -> Result<bool, StorageError> {
        Ok(self.artifacts.remove(key).is_some())
    }

    fn list_codes(&self) -> Result<Vec<CodeId>, StorageError> {
        // BTreeMap order is by owner first, so codes come out sorted.
        Ok(self
            .artifacts
            .keys()
            .filter(|key| key.kind == ArtifactKind::Source)
            .filter_map(|key| CodeId::parse(&key.owner).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(owner: &str, kind: ArtifactKind) -> ArtifactKey {
        ArtifactKey::new(owner, kind)
    }

    #[test]
    fn put_get_replace() {
        let mut store = InMemoryStore::new();
        let k = key("7", ArtifactKind::Source);
        store.put(&k, "class A {}").unwrap();
        assert_eq!(store.get(&k).unwrap(), "class A {}");
        store.put(&k, "class B {}").unwrap();
        assert_eq!(store.get(&k).unwrap(), "class B {}");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let store = InMemoryStore::new();
        let k = key("7", ArtifactKind::Expected);
        assert!(matches!(store.get(&k), Err(StorageError::NotFound(found)) if found == k));
        assert!(!store.exists(&k).unwrap());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let mut store = InMemoryStore::new();
        let k = key("7", ArtifactKind::Instrumented);
        store.put(&k, "x").unwrap();
        assert!(store.delete(&k).unwrap());
        assert!(!store.delete(&k).unwrap());
    }

    #[test]
    fn list_codes_counts_sources_only() {
        let mut store = InMemoryStore::new();
        store.put(&key("b", ArtifactKind::Source), "").unwrap();
        store.put(&key("a", ArtifactKind::Source), "").unwrap();
        store.put(&key("c", ArtifactKind::Expected), "").unwrap();
        let codes: Vec<String> = store
            .list_codes()
            .unwrap()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        assert_eq!(codes, vec!["a", "b"]);
    }
}
