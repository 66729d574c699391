use thiserror::Error;

/// Errors from file repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A record with the same public or private key already exists.
    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("repository backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
