use relay_repository::RepositoryError;
use relay_storage::StorageError;
use thiserror::Error;

/// Errors that abort a whole sweep or prevent the collector from starting.
#[derive(Debug, Error)]
pub enum GcError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The schedule expression could not be parsed.
    #[error("invalid schedule: {0}")]
    Schedule(String),
}
