use std::path::{Path, PathBuf};

use crate::error::StorageError;
use crate::storage::{FileStorage, collect_bytes};

/// Binary content large enough to span several read chunks.
fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| u8::try_from(i % 251).unwrap_or(0)).collect()
}

async fn write_source(scratch: &Path, name: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
    let path = scratch.join(name);
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Run the full file storage conformance test suite.
///
/// `scratch` is a writable directory for source files; it must not be the
/// storage backend's own root.
///
/// # Errors
///
/// Returns an error if the backend fails during any test.
pub async fn run_storage_conformance_tests(
    storage: &dyn FileStorage,
    scratch: &Path,
) -> Result<(), StorageError> {
    test_is_live(storage).await?;
    test_round_trip(storage, scratch).await?;
    test_empty_file(storage, scratch).await?;
    test_distinct_keys(storage, scratch).await?;
    test_load_missing(storage).await?;
    test_delete_is_idempotent(storage, scratch).await?;
    Ok(())
}

async fn test_is_live(storage: &dyn FileStorage) -> Result<(), StorageError> {
    assert!(storage.is_live().await, "backend should report live");
    Ok(())
}

async fn test_round_trip(storage: &dyn FileStorage, scratch: &Path) -> Result<(), StorageError> {
    let content = sample_content(300 * 1024);
    let source = write_source(scratch, "round-trip.bin", &content).await?;

    let key = storage.put(&source).await?;
    assert!(!key.is_empty());
    assert!(
        !key.contains('/') && !key.contains(&*scratch.to_string_lossy()),
        "stored key should be opaque, got {key}"
    );
    assert!(
        tokio::fs::try_exists(&source).await?,
        "put must leave the source file in place"
    );

    let loaded = collect_bytes(storage.load(&key).await?).await?;
    assert_eq!(loaded.len(), content.len());
    assert!(loaded == content, "loaded content should be byte-identical");

    storage.delete(&key).await?;
    Ok(())
}

async fn test_empty_file(storage: &dyn FileStorage, scratch: &Path) -> Result<(), StorageError> {
    let source = write_source(scratch, "empty.bin", &[]).await?;
    let key = storage.put(&source).await?;
    let loaded = collect_bytes(storage.load(&key).await?).await?;
    assert!(loaded.is_empty());
    storage.delete(&key).await?;
    Ok(())
}

async fn test_distinct_keys(storage: &dyn FileStorage, scratch: &Path) -> Result<(), StorageError> {
    let source = write_source(scratch, "twice.txt", b"same bytes").await?;
    let first = storage.put(&source).await?;
    let second = storage.put(&source).await?;
    assert_ne!(first, second, "each put should produce its own key");

    storage.delete(&first).await?;
    let survivor = collect_bytes(storage.load(&second).await?).await?;
    assert_eq!(&survivor[..], b"same bytes");

    storage.delete(&second).await?;
    Ok(())
}

async fn test_load_missing(storage: &dyn FileStorage) -> Result<(), StorageError> {
    match storage.load("0123456789abcdef0123456789abcdef").await {
        Err(StorageError::NotFound(_)) => Ok(()),
        Err(other) => Err(other),
        Ok(_) => panic!("load of a missing key should fail with NotFound"),
    }
}

async fn test_delete_is_idempotent(
    storage: &dyn FileStorage,
    scratch: &Path,
) -> Result<(), StorageError> {
    let source = write_source(scratch, "delete.txt", b"bye").await?;
    let key = storage.put(&source).await?;

    storage.delete(&key).await?;
    assert!(matches!(
        storage.load(&key).await,
        Err(StorageError::NotFound(_))
    ));
    storage.delete(&key).await?;
    storage.delete("fedcba9876543210fedcba9876543210").await?;
    Ok(())
}
