//! Both backends run through the same contract checks.

use tempfile::TempDir;
use vartrace_core::{CodeId, RunId};
use vartrace_storage::{ArtifactKey, ArtifactKind, ArtifactStore, FsStore, InMemoryStore, StorageError};

fn code(id: &str) -> CodeId {
    CodeId::parse(id).unwrap()
}

fn exercise(store: &mut dyn ArtifactStore) {
    let source = ArtifactKey::code(&code("42"), ArtifactKind::Source);
    let instrumented = ArtifactKey::code(&code("42"), ArtifactKind::Instrumented);
    let trace = ArtifactKey::run(RunId::new(), ArtifactKind::Trace);

    assert!(matches!(store.get(&source), Err(StorageError::NotFound(_))));
    store.put(&source, "class P {}\n").unwrap();
    store.put(&instrumented, "class P { }\n").unwrap();
    store.put(&trace, "1//1//x//Int32//0//5\n").unwrap();
    store
        .put(&ArtifactKey::code(&code("7"), ArtifactKind::Source), "")
        .unwrap();

    assert_eq!(store.get(&source).unwrap(), "class P {}\n");
    assert!(store.exists(&trace).unwrap());
    assert_eq!(store.list_codes().unwrap(), vec![code("42"), code("7")]);

    assert!(store.delete(&instrumented).unwrap());
    assert!(!store.exists(&instrumented).unwrap());
    assert!(!store.delete(&instrumented).unwrap());

    let bad = ArtifactKey::new("a/b", ArtifactKind::Source);
    assert!(matches!(store.put(&bad, ""), Err(StorageError::InvalidKey { .. })));
}

// ----------------------------------------------------------------------
// Backends
// ----------------------------------------------------------------------

#[test]
fn in_memory_store_honours_the_contract() {
    let mut store = InMemoryStore::new();
    exercise(&mut store);
}

#[test]
fn fs_store_honours_the_contract() {
    let dir = TempDir::new().unwrap();
    let mut store = FsStore::open(dir.path().join("code_files")).unwrap();
    exercise(&mut store);
}

#[test]
fn fs_store_uses_the_artifact_file_layout() {
    let dir = TempDir::new().unwrap();
    let mut store = FsStore::open(dir.path()).unwrap();
    let key = ArtifactKey::code(&code("42"), ArtifactKind::TrackingSpec);
    store.put(&key, "9 sum i\n").unwrap();
    let on_disk = std::fs::read_to_string(dir.path().join("42init.txt")).unwrap();
    assert_eq!(on_disk, "9 sum i\n");
    assert_eq!(store.path_of(&key), dir.path().join("42init.txt"));
}

#[test]
fn fs_store_reopens_existing_artifacts() {
    let dir = TempDir::new().unwrap();
    {
        let mut store = FsStore::open(dir.path()).unwrap();
        store
            .put(&ArtifactKey::code(&code("a"), ArtifactKind::Source), "x")
            .unwrap();
    }
    let store = FsStore::open(dir.path()).unwrap();
    assert_eq!(store.list_codes().unwrap(), vec![code("a")]);
}
