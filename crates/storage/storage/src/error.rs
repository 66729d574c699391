use thiserror::Error;

/// Errors from file storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// The key is empty or would escape the storage namespace.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Map an I/O error, turning `NotFound` into [`StorageError::NotFound`].
    pub fn from_io(key: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(key.to_owned())
        } else {
            Self::Io(err)
        }
    }
}
