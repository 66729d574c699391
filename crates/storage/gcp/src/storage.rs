use std::path::Path;

use async_trait::async_trait;
use google_cloud_auth::credentials::service_account;
use google_cloud_storage::client::{Storage, StorageControl};
use tracing::{debug, error, info, instrument, warn};

use relay_storage::error::StorageError;
use relay_storage::key::{check_key, new_object_key, prefixed};
use relay_storage::storage::{ByteStream, FileStorage};

use crate::config::GcsStorageConfig;
use crate::error::classify_gcp_error;

/// Google Cloud Storage implementation of [`FileStorage`].
pub struct GcsFileStorage {
    config: GcsStorageConfig,
    bucket_path: String,
    storage: Storage,
    control: StorageControl,
}

impl std::fmt::Debug for GcsFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsFileStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GcsFileStorage {
    /// Build the data and control clients.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] if credentials or either
    /// client cannot be built.
    pub async fn new(config: GcsStorageConfig) -> Result<Self, StorageError> {
        let credentials = match config.service_account_key().await? {
            Some(key) => Some(service_account::Builder::new(key).build().map_err(|e| {
                StorageError::Configuration(format!("GCP service account credentials: {e}"))
            })?),
            None => None,
        };

        // Data-plane client (read/write).
        let mut storage_builder = Storage::builder();
        if let Some(ref endpoint) = config.endpoint_url {
            storage_builder = storage_builder.with_endpoint(endpoint);
        }
        if let Some(ref creds) = credentials {
            storage_builder = storage_builder.with_credentials(creds.clone());
        }
        let storage = storage_builder.build().await.map_err(|e| {
            StorageError::Configuration(format!("Cloud Storage client error: {e}"))
        })?;

        // Control-plane client (delete, bucket metadata).
        let mut control_builder = StorageControl::builder();
        if let Some(ref endpoint) = config.endpoint_url {
            control_builder = control_builder.with_endpoint(endpoint);
        }
        if let Some(ref creds) = credentials {
            control_builder = control_builder.with_credentials(creds.clone());
        }
        let control = control_builder.build().await.map_err(|e| {
            StorageError::Configuration(format!("Cloud Storage control client error: {e}"))
        })?;

        Ok(Self {
            bucket_path: config.bucket_path(),
            config,
            storage,
            control,
        })
    }

    fn object_name(&self, key: &str) -> Result<String, StorageError> {
        Ok(prefixed(self.config.prefix.as_deref(), check_key(key)?))
    }
}

#[async_trait]
impl FileStorage for GcsFileStorage {
    #[instrument(skip(self, source), fields(backend = "gcp-storage"))]
    async fn put(&self, source: &Path) -> Result<String, StorageError> {
        let key = new_object_key();
        let object_name = self.object_name(&key)?;

        let body = bytes::Bytes::from(tokio::fs::read(source).await?);
        debug!(bucket = %self.config.bucket, object_name = %object_name, size = body.len(), "uploading object");

        let write_request = self
            .storage
            .write_object(&self.bucket_path, &object_name, body);
        Box::pin(write_request.send_buffered()).await.map_err(|e| {
            let err_str = e.to_string();
            error!(error = %err_str, "Cloud Storage upload failed");
            classify_gcp_error(&key, &err_str)
        })?;

        info!(bucket = %self.config.bucket, object_name = %object_name, "object uploaded");
        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "gcp-storage"))]
    async fn load(&self, key: &str) -> Result<ByteStream, StorageError> {
        let object_name = self.object_name(key)?;

        let response = self
            .storage
            .read_object(&self.bucket_path, &object_name)
            .send()
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                match classify_gcp_error(key, &err_str) {
                    StorageError::NotFound(k) => StorageError::NotFound(k),
                    other => {
                        error!(error = %err_str, "Cloud Storage download failed");
                        other
                    }
                }
            })?;

        let key = key.to_owned();
        Ok(Box::pin(futures::stream::unfold(
            (key, response),
            |(key, mut response)| async move {
                let chunk = response.next().await?;
                let chunk = chunk.map_err(|e| {
                    StorageError::BackendUnavailable(format!("reading {key} from GCS: {e}"))
                });
                Some((chunk, (key, response)))
            },
        )))
    }

    #[instrument(skip(self), fields(backend = "gcp-storage"))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let object_name = self.object_name(key)?;

        let result = self
            .control
            .delete_object()
            .set_bucket(&self.bucket_path)
            .set_object(&object_name)
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!(bucket = %self.config.bucket, object_name = %object_name, "object deleted");
                Ok(())
            }
            Err(e) => match classify_gcp_error(key, &e.to_string()) {
                StorageError::NotFound(_) => Ok(()),
                other => {
                    error!(error = %e, "Cloud Storage delete failed");
                    Err(other)
                }
            },
        }
    }

    async fn is_live(&self) -> bool {
        match self
            .control
            .get_bucket()
            .set_name(&self.bucket_path)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(bucket = %self.config.bucket, error = %e, "Cloud Storage bucket unreachable");
                false
            }
        }
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use relay_storage::testing::run_storage_conformance_tests;

    use super::*;

    /// Runs against the bucket in `GCP_BUCKET`, authenticating with the key
    /// file in `GCP_KEY_FILE_LOCATION` or Application Default Credentials.
    #[tokio::test]
    async fn storage_conformance() {
        let bucket = std::env::var("GCP_BUCKET").unwrap_or_else(|_| "relay-test".into());
        let mut config = GcsStorageConfig::new(bucket).with_prefix("conformance");
        if let Ok(path) = std::env::var("GCP_KEY_FILE_LOCATION") {
            config = config.with_credentials_path(path);
        }

        let storage = GcsFileStorage::new(config).await.expect("clients should build");
        let scratch = tempfile::tempdir().unwrap();
        run_storage_conformance_tests(&storage, scratch.path())
            .await
            .expect("conformance tests should pass");
    }
}
