use std::path::Path;

use async_trait::async_trait;
use azure_core::fs::FileStreamBuilder;
use azure_core::http::{Body, RequestContent};
use azure_core::stream::SeekableStream;
use azure_storage_blob::{BlobClient, BlobContainerClient};
use futures::TryStreamExt;
use tracing::{debug, error, info, instrument, warn};

use relay_storage::error::StorageError;
use relay_storage::key::{check_key, new_object_key, prefixed};
use relay_storage::storage::{ByteStream, FileStorage};

use crate::auth::BlobAuth;
use crate::config::AzureBlobStorageConfig;
use crate::error::classify_azure_error;

/// Size of the chunks read from the source file during an upload.
const UPLOAD_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Azure Blob Storage implementation of [`FileStorage`].
///
/// Uploads stream the source file from disk and downloads hand back the
/// response body chunk by chunk.
pub struct AzureBlobFileStorage {
    config: AzureBlobStorageConfig,
    auth: BlobAuth,
    endpoint: String,
}

impl std::fmt::Debug for AzureBlobFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobFileStorage")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl AzureBlobFileStorage {
    /// Resolve the credential and check that a client can be built.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] if the credential or client
    /// cannot be constructed.
    pub fn new(config: AzureBlobStorageConfig) -> Result<Self, StorageError> {
        let auth = BlobAuth::from_config(&config)?;
        let endpoint = config.endpoint();
        auth.service_client(&endpoint)?;

        Ok(Self {
            config,
            auth,
            endpoint,
        })
    }

    fn blob_name(&self, key: &str) -> Result<String, StorageError> {
        Ok(prefixed(self.config.prefix.as_deref(), check_key(key)?))
    }

    fn blob_client(&self, blob_name: &str) -> Result<BlobClient, StorageError> {
        Ok(self
            .auth
            .service_client(&self.endpoint)?
            .blob_client(&self.config.container, blob_name))
    }

    fn container_client(&self) -> Result<BlobContainerClient, StorageError> {
        Ok(self
            .auth
            .service_client(&self.endpoint)?
            .blob_container_client(&self.config.container))
    }
}

#[async_trait]
impl FileStorage for AzureBlobFileStorage {
    #[instrument(skip(self, source), fields(backend = "azure-blob"))]
    async fn put(&self, source: &Path) -> Result<String, StorageError> {
        let key = new_object_key();
        let blob_name = self.blob_name(&key)?;

        let file = tokio::fs::File::open(source).await?;
        let content_length = file.metadata().await?.len();
        let stream = FileStreamBuilder::new(file)
            .buffer_size(UPLOAD_BUFFER_SIZE)
            .build()
            .await
            .map_err(|e| StorageError::BackendUnavailable(format!("upload source: {e}")))?;
        debug!(container = %self.config.container, blob_name = %blob_name, size = content_length, "uploading blob");

        let body: Box<dyn SeekableStream> = Box::new(stream);
        self.blob_client(&blob_name)?
            .upload(<RequestContent<_, _> as From<Body>>::from(Body::from(body)), true, content_length, None)
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                error!(error = %err_str, "blob upload failed");
                classify_azure_error(&key, &err_str)
            })?;

        info!(container = %self.config.container, blob_name = %blob_name, "blob uploaded");
        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "azure-blob"))]
    async fn load(&self, key: &str) -> Result<ByteStream, StorageError> {
        let blob_name = self.blob_name(key)?;

        let response = self
            .blob_client(&blob_name)?
            .download(None)
            .await
            .map_err(|e| {
                let err_str = e.to_string();
                match classify_azure_error(key, &err_str) {
                    StorageError::NotFound(k) => StorageError::NotFound(k),
                    other => {
                        error!(error = %err_str, "blob download failed");
                        other
                    }
                }
            })?;

        let body = response.into_body().map_err(|e| {
            warn!(error = %e, "blob body interrupted");
            StorageError::BackendUnavailable(format!("failed to read blob body: {e}"))
        });
        Ok(Box::pin(body))
    }

    #[instrument(skip(self), fields(backend = "azure-blob"))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let blob_name = self.blob_name(key)?;

        match self.blob_client(&blob_name)?.delete(None).await {
            Ok(_) => {
                debug!(container = %self.config.container, blob_name = %blob_name, "blob deleted");
                Ok(())
            }
            Err(e) => match classify_azure_error(key, &e.to_string()) {
                StorageError::NotFound(_) => Ok(()),
                other => {
                    error!(error = %e, "blob delete failed");
                    Err(other)
                }
            },
        }
    }

    /// Reads the configured container's properties, which a
    /// container-scoped credential is allowed to do.
    async fn is_live(&self) -> bool {
        let client = match self.container_client() {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "Azure Blob client unavailable");
                return false;
            }
        };
        match client.get_properties(None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(container = %self.config.container, error = %e, "Azure Blob container unreachable");
                false
            }
        }
    }
}

#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use relay_storage::testing::run_storage_conformance_tests;

    use super::*;

    /// Runs against the account in `AZ_STORAGE_ACCOUNT_NAME` and container in
    /// `AZ_STORAGE_CONTAINER`, authenticating with
    /// `AZ_STORAGE_ACCOUNT_ACCESS_KEY` when set and the Azure CLI login
    /// otherwise.
    #[tokio::test]
    async fn storage_conformance() {
        let account = std::env::var("AZ_STORAGE_ACCOUNT_NAME")
            .expect("AZ_STORAGE_ACCOUNT_NAME must be set");
        let container =
            std::env::var("AZ_STORAGE_CONTAINER").unwrap_or_else(|_| "relay-test".into());
        let mut config =
            AzureBlobStorageConfig::new(account, container).with_prefix("conformance");
        if let Ok(access_key) = std::env::var("AZ_STORAGE_ACCOUNT_ACCESS_KEY") {
            config = config.with_access_key(access_key);
        }

        let storage = AzureBlobFileStorage::new(config).expect("client should build");
        let scratch = tempfile::tempdir().unwrap();
        run_storage_conformance_tests(&storage, scratch.path())
            .await
            .expect("conformance tests should pass");
    }
}
