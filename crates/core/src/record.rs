use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one stored file.
///
/// Every field except `last_activity` is fixed at upload time.
/// `last_activity` moves forward on each successful retrieval and drives
/// inactivity eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Shareable key used to retrieve the file.
    pub public_key: String,
    /// Secret key used to delete the file.
    pub private_key: String,
    /// Opaque key returned by the storage backend.
    pub storage_path: String,
    pub mime_type: String,
    /// Size of the content in bytes.
    pub size: u64,
    pub last_activity: DateTime<Utc>,
}

impl FileRecord {
    /// Whether the record has seen no activity after `cutoff`.
    pub fn is_inactive_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_activity <= cutoff
    }
}

/// The immutable part of a [`FileRecord`], supplied on insert.
///
/// The repository stamps `last_activity` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub public_key: String,
    pub private_key: String,
    pub storage_path: String,
    pub mime_type: String,
    pub size: u64,
}

impl NewFileRecord {
    /// Complete the record with its initial activity timestamp.
    pub fn into_record(self, last_activity: DateTime<Utc>) -> FileRecord {
        FileRecord {
            public_key: self.public_key,
            private_key: self.private_key,
            storage_path: self.storage_path,
            mime_type: self.mime_type,
            size: self.size,
            last_activity,
        }
    }
}
