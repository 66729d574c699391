use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use relay_storage::error::StorageError;
use relay_storage::key::{check_key, new_object_key};
use relay_storage::storage::{ByteStream, FileStorage};

/// Stores each file as `<root>/<key>` on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Use `root` as the storage directory. The directory is not created
    /// until [`init`](Self::init) is called.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directory if needed.
    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(check_key(key)?))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put(&self, source: &Path) -> Result<String, StorageError> {
        let key = new_object_key();
        let dest = self.path_for(&key)?;
        let bytes = tokio::fs::copy(source, &dest).await?;
        debug!(key = %key, bytes, "stored file locally");
        Ok(key)
    }

    async fn load(&self, key: &str) -> Result<ByteStream, StorageError> {
        let path = self.path_for(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(key, e))?;
        Ok(Box::pin(ReaderStream::new(file).map_err(StorageError::Io)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "removed local file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn is_live(&self) -> bool {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => true,
            Ok(_) => {
                warn!(root = %self.root.display(), "storage root is not a directory");
                false
            }
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "storage root unavailable");
                false
            }
        }
    }
}
