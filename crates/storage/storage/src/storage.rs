use std::path::Path;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::StorageError;

/// A lazily consumed, single-pass, finite stream of content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Blob storage for file content.
///
/// Keys returned by [`put`](Self::put) are exactly what [`load`](Self::load)
/// and [`delete`](Self::delete) accept. Any backend-specific prefix is
/// applied internally. `put` never removes its source file.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Copy or upload the file at `source` and return its stored key.
    async fn put(&self, source: &Path) -> Result<String, StorageError>;

    /// Open the content stored under `key`.
    ///
    /// Fails with [`StorageError::NotFound`] if nothing is stored there.
    async fn load(&self, key: &str) -> Result<ByteStream, StorageError>;

    /// Remove the content stored under `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether the directory, bucket or container is reachable. Never fails.
    async fn is_live(&self) -> bool;
}

/// Drain a [`ByteStream`] into one contiguous buffer.
pub async fn collect_bytes(mut stream: ByteStream) -> Result<Bytes, StorageError> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}
