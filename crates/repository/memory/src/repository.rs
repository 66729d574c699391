use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use relay_core::{Clock, FileRecord, NewFileRecord};
use relay_repository::error::RepositoryError;
use relay_repository::repository::{ActivityCursor, FileRepository};

/// Both indexes, always mutated together.
#[derive(Debug, Default)]
struct Indexes {
    /// Records keyed by public key.
    by_public: HashMap<String, FileRecord>,
    /// Private key to public key.
    by_private: HashMap<String, String>,
    /// `(last_activity, public_key)` pairs, ordered oldest first.
    by_activity: BTreeSet<(DateTime<Utc>, String)>,
}

impl Indexes {
    fn touch(&mut self, public_key: &str, now: DateTime<Utc>) -> Option<FileRecord> {
        let record = self.by_public.get_mut(public_key)?;
        self.by_activity
            .remove(&(record.last_activity, record.public_key.clone()));
        // Never move backwards if the clock was set into the past.
        record.last_activity = record.last_activity.max(now);
        self.by_activity
            .insert((record.last_activity, record.public_key.clone()));
        Some(record.clone())
    }

    fn remove_by_private(&mut self, private_key: &str) -> Option<FileRecord> {
        let public_key = self.by_private.remove(private_key)?;
        let record = self.by_public.remove(&public_key)?;
        self.by_activity
            .remove(&(record.last_activity, record.public_key.clone()));
        Some(record)
    }
}

/// In-memory [`FileRepository`].
///
/// A single lock guards every index so that check-then-insert, find-and-update
/// and find-and-delete are atomic. Contents are lost on restart.
#[derive(Debug)]
pub struct MemoryFileRepository {
    indexes: RwLock<Indexes>,
    clock: Arc<dyn Clock>,
}

impl MemoryFileRepository {
    /// Create an empty repository.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            indexes: RwLock::new(Indexes::default()),
            clock,
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.indexes.read().by_public.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn add(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError> {
        let now = self.clock.now();
        let mut indexes = self.indexes.write();

        if indexes.by_public.contains_key(&record.public_key) {
            return Err(RepositoryError::DuplicateKey(format!(
                "public key {}",
                record.public_key
            )));
        }
        if indexes.by_private.contains_key(&record.private_key) {
            return Err(RepositoryError::DuplicateKey(format!(
                "private key {}",
                record.private_key
            )));
        }

        let record = record.into_record(now);
        indexes
            .by_private
            .insert(record.private_key.clone(), record.public_key.clone());
        indexes
            .by_activity
            .insert((record.last_activity, record.public_key.clone()));
        indexes
            .by_public
            .insert(record.public_key.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, public_key: &str) -> Result<Option<FileRecord>, RepositoryError> {
        let now = self.clock.now();
        Ok(self.indexes.write().touch(public_key, now))
    }

    async fn delete(&self, private_key: &str) -> Result<Option<FileRecord>, RepositoryError> {
        Ok(self.indexes.write().remove_by_private(private_key))
    }

    async fn list_inactive_after(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&ActivityCursor>,
        max: usize,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        let indexes = self.indexes.read();
        let start = match after {
            Some(cursor) => Bound::Excluded((cursor.last_activity, cursor.public_key.clone())),
            None => Bound::Unbounded,
        };
        Ok(indexes
            .by_activity
            .range((start, Bound::Unbounded))
            .take_while(|(last_activity, _)| *last_activity <= cutoff)
            .filter_map(|(_, public_key)| indexes.by_public.get(public_key).cloned())
            .take(max)
            .collect())
    }

    async fn is_live(&self) -> bool {
        true
    }
}
