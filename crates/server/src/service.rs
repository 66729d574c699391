use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_core::{Clock, NewFileRecord, generate_key};
use relay_ratelimit::{Direction, RateLimiter};
use relay_repository::{FileRepository, RepositoryError};
use relay_storage::{ByteStream, FileStorage, StorageError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::OnBackendError;
use crate::error::ServiceError;

/// How many times an upload draws fresh keys after a collision.
const MAX_KEY_ATTEMPTS: usize = 3;

/// Keys handed back after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedKeys {
    pub public_key: String,
    pub private_key: String,
}

/// An open download.
pub struct Download {
    pub stream: ByteStream,
    pub mime_type: String,
    pub size: u64,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("mime_type", &self.mime_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Aggregated liveness of every backend.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub cache: bool,
    pub db: bool,
    pub storage: bool,
    /// Seconds since the service was created.
    pub uptime: i64,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrates the rate limiter, repository and storage for each request.
pub struct FileService {
    limiter: Arc<dyn RateLimiter>,
    repository: Arc<dyn FileRepository>,
    storage: Arc<dyn FileStorage>,
    clock: Arc<dyn Clock>,
    on_backend_error: OnBackendError,
    started_at: DateTime<Utc>,
}

impl FileService {
    pub fn new(
        limiter: Arc<dyn RateLimiter>,
        repository: Arc<dyn FileRepository>,
        storage: Arc<dyn FileStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let started_at = clock.now();
        Self {
            limiter,
            repository,
            storage,
            clock,
            on_backend_error: OnBackendError::default(),
            started_at,
        }
    }

    /// Set what happens when the rate limiter backend fails.
    #[must_use]
    pub fn with_backend_error_policy(mut self, policy: OnBackendError) -> Self {
        self.on_backend_error = policy;
        self
    }

    /// Store the spooled file at `temp_path` and register it.
    ///
    /// The temp file is removed whatever the outcome.
    #[instrument(skip(self, temp_path))]
    pub async fn upload(
        &self,
        temp_path: &Path,
        mime_type: &str,
        size: u64,
        client: &str,
    ) -> Result<UploadedKeys, ServiceError> {
        let result = self.store(temp_path, mime_type, size, client).await;
        match tokio::fs::remove_file(temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %temp_path.display(), error = %e, "failed to remove temp file"),
        }
        result
    }

    async fn store(
        &self,
        temp_path: &Path,
        mime_type: &str,
        size: u64,
        client: &str,
    ) -> Result<UploadedKeys, ServiceError> {
        if !self.quota_allows(Direction::Upload, client).await? {
            return Err(ServiceError::QuotaExceeded(Direction::Upload));
        }

        let storage_path = self.storage.put(temp_path).await.map_err(storage_error)?;

        let mut attempts = 0;
        let record = loop {
            attempts += 1;
            let new = NewFileRecord {
                public_key: generate_key(),
                private_key: generate_key(),
                storage_path: storage_path.clone(),
                mime_type: mime_type.to_owned(),
                size,
            };
            match self.repository.add(new).await {
                Ok(record) => break record,
                Err(RepositoryError::DuplicateKey(key)) if attempts < MAX_KEY_ATTEMPTS => {
                    debug!(key = %key, attempts, "key collision, retrying");
                }
                Err(e) => {
                    self.discard_blob(&storage_path).await;
                    return Err(match e {
                        RepositoryError::DuplicateKey(_) => ServiceError::DuplicateKey,
                        other => {
                            warn!(error = %other, "file repository unavailable");
                            ServiceError::BackendUnavailable(other.to_string())
                        }
                    });
                }
            }
        };

        self.record_usage(Direction::Upload, client).await;
        info!(public_key = %record.public_key, size, "file uploaded");
        Ok(UploadedKeys {
            public_key: record.public_key,
            private_key: record.private_key,
        })
    }

    /// Open the file behind `public_key`, refreshing its activity.
    #[instrument(skip(self))]
    pub async fn download(&self, public_key: &str, client: &str) -> Result<Download, ServiceError> {
        let record = self
            .repository
            .get(public_key)
            .await
            .map_err(repository_error)?
            .ok_or(ServiceError::NotFound)?;

        if !self.quota_allows(Direction::Download, client).await? {
            return Err(ServiceError::QuotaExceeded(Direction::Download));
        }

        let stream = self
            .storage
            .load(&record.storage_path)
            .await
            .map_err(storage_error)?;

        self.record_usage(Direction::Download, client).await;
        debug!(public_key, "download started");
        Ok(Download {
            stream,
            mime_type: record.mime_type,
            size: record.size,
        })
    }

    /// Remove the file owned by `private_key`.
    ///
    /// Metadata goes first. A storage failure afterwards is only logged.
    #[instrument(skip(self, private_key))]
    pub async fn delete(&self, private_key: &str) -> Result<(), ServiceError> {
        let record = self
            .repository
            .delete(private_key)
            .await
            .map_err(repository_error)?
            .ok_or(ServiceError::NotFound)?;

        if let Err(e) = self.storage.delete(&record.storage_path).await {
            warn!(
                storage_path = %record.storage_path,
                error = %e,
                "stored content left behind after delete"
            );
        }
        info!(public_key = %record.public_key, "file deleted");
        Ok(())
    }

    /// Probe every backend concurrently.
    pub async fn health(&self) -> HealthReport {
        let (cache, db, storage) = tokio::join!(
            self.limiter.is_live(),
            self.repository.is_live(),
            self.storage.is_live(),
        );
        let now = self.clock.now();
        HealthReport {
            healthy: cache && db && storage,
            cache,
            db,
            storage,
            uptime: (now - self.started_at).num_seconds(),
            timestamp: now,
        }
    }

    async fn quota_allows(&self, direction: Direction, client: &str) -> Result<bool, ServiceError> {
        match self.limiter.allows(direction, client).await {
            Ok(allowed) => Ok(allowed),
            Err(e) => {
                warn!(%direction, error = %e, policy = ?self.on_backend_error, "quota check failed");
                match self.on_backend_error {
                    OnBackendError::Allow => Ok(true),
                    OnBackendError::Deny => Err(ServiceError::BackendUnavailable(e.to_string())),
                }
            }
        }
    }

    async fn record_usage(&self, direction: Direction, client: &str) {
        if let Err(e) = self.limiter.record(direction, client).await {
            warn!(%direction, error = %e, "failed to record quota usage");
        }
    }

    async fn discard_blob(&self, storage_path: &str) {
        if let Err(e) = self.storage.delete(storage_path).await {
            warn!(storage_path, error = %e, "failed to remove orphaned content");
        }
    }
}

fn repository_error(e: RepositoryError) -> ServiceError {
    match e {
        RepositoryError::DuplicateKey(_) => ServiceError::DuplicateKey,
        other => {
            warn!(error = %other, "file repository unavailable");
            ServiceError::BackendUnavailable(other.to_string())
        }
    }
}

fn storage_error(e: StorageError) -> ServiceError {
    match e {
        StorageError::NotFound(_) => ServiceError::NotFound,
        other => {
            warn!(error = %other, "file storage unavailable");
            ServiceError::BackendUnavailable(other.to_string())
        }
    }
}
