use async_trait::async_trait;
use chrono::{DateTime, Utc};

use relay_core::{FileRecord, NewFileRecord};

use crate::error::RepositoryError;

/// Position in the `(last_activity, public_key)` ordering of inactive records.
///
/// Pages after a cursor start strictly past it, so records that stay behind
/// (for example because their eviction failed) are not listed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCursor {
    pub last_activity: DateTime<Utc>,
    pub public_key: String,
}

impl From<&FileRecord> for ActivityCursor {
    fn from(record: &FileRecord) -> Self {
        Self {
            last_activity: record.last_activity,
            public_key: record.public_key.clone(),
        }
    }
}

/// Persistence for [`FileRecord`] metadata with lookup by either key.
///
/// Implementations must be `Send + Sync` and safe for concurrent access.
/// `get` and `delete` are each atomic: a concurrent lookup and delete of the
/// same record observe it either fully present or fully gone.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Insert a new record with `last_activity` set to now.
    ///
    /// Fails with [`RepositoryError::DuplicateKey`] if either key is taken.
    async fn add(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError>;

    /// Look up a record by public key, refreshing its `last_activity` to now
    /// on a hit. The returned record carries the refreshed timestamp.
    async fn get(&self, public_key: &str) -> Result<Option<FileRecord>, RepositoryError>;

    /// Remove and return the record matching `private_key`.
    async fn delete(&self, private_key: &str) -> Result<Option<FileRecord>, RepositoryError>;

    /// Up to `max` records whose `last_activity` is at or before `cutoff`,
    /// ordered oldest first with ties broken by public key.
    async fn list_inactive_since(
        &self,
        cutoff: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        self.list_inactive_after(cutoff, None, max).await
    }

    /// Like [`list_inactive_since`](Self::list_inactive_since), but only
    /// records ordered strictly after `after` when it is set.
    async fn list_inactive_after(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&ActivityCursor>,
        max: usize,
    ) -> Result<Vec<FileRecord>, RepositoryError>;

    /// Whether the backend is reachable. Never fails.
    async fn is_live(&self) -> bool;
}
