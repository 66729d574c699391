use std::sync::Arc;

use relay_storage::FileStorage;
#[cfg(feature = "aws")]
use relay_storage_aws::{S3FileStorage, S3StorageConfig};
#[cfg(feature = "azure")]
use relay_storage_azure::{AzureBlobFileStorage, AzureBlobStorageConfig};
#[cfg(feature = "gcp")]
use relay_storage_gcp::{GcsFileStorage, GcsStorageConfig};
use relay_storage_local::LocalFileStorage;
use tracing::info;

use crate::config::{StorageConfig, StorageProvider};
use crate::error::ServerError;

/// Create a file storage backend for the selected provider.
pub async fn create_storage(
    provider: StorageProvider,
    config: &StorageConfig,
) -> Result<Arc<dyn FileStorage>, ServerError> {
    let storage: Arc<dyn FileStorage> = match provider {
        StorageProvider::Local => {
            let storage = LocalFileStorage::new(&config.local_root);
            storage
                .init()
                .await
                .map_err(|e| ServerError::Backend(format!("local storage: {e}")))?;
            Arc::new(storage)
        }
        #[cfg(feature = "aws")]
        StorageProvider::Aws => {
            let bucket = required(config.bucket.as_deref(), "bucket")?;
            let region = config.region.as_deref().unwrap_or("us-east-1");
            let mut s3_config = S3StorageConfig::new(region, bucket);
            if let Some(prefix) = &config.prefix {
                s3_config = s3_config.with_prefix(prefix);
            }
            if let Some(endpoint) = &config.endpoint_url {
                s3_config = s3_config.with_endpoint_url(endpoint);
            }
            if let (Some(id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
                s3_config = s3_config.with_static_credentials(id, secret);
            }
            Arc::new(S3FileStorage::new(s3_config).await)
        }
        #[cfg(feature = "azure")]
        StorageProvider::Azure => {
            let account = required(config.account.as_deref(), "account")?;
            let container = required(config.container.as_deref(), "container")?;
            let mut az_config = AzureBlobStorageConfig::new(account, container);
            if let Some(prefix) = &config.prefix {
                az_config = az_config.with_prefix(prefix);
            }
            if let Some(endpoint) = &config.endpoint_url {
                az_config = az_config.with_endpoint_url(endpoint);
            }
            if let (Some(tenant), Some(client), Some(secret)) =
                (&config.tenant_id, &config.client_id, &config.client_secret)
            {
                az_config = az_config.with_service_principal(tenant, client, secret);
            }
            if let Some(access_key) = &config.access_key {
                az_config = az_config.with_access_key(access_key);
            }
            let storage = AzureBlobFileStorage::new(az_config)
                .map_err(|e| ServerError::Backend(format!("azure storage: {e}")))?;
            Arc::new(storage)
        }
        #[cfg(feature = "gcp")]
        StorageProvider::Gcp => {
            let bucket = required(config.bucket.as_deref(), "bucket")?;
            let mut gcs_config = GcsStorageConfig::new(bucket);
            if let Some(prefix) = &config.prefix {
                gcs_config = gcs_config.with_prefix(prefix);
            }
            if let Some(path) = &config.credentials_path {
                gcs_config = gcs_config.with_credentials_path(path);
            }
            if let Some(endpoint) = &config.endpoint_url {
                gcs_config = gcs_config.with_endpoint_url(endpoint);
            }
            let storage = GcsFileStorage::new(gcs_config)
                .await
                .map_err(|e| ServerError::Backend(format!("gcs storage: {e}")))?;
            Arc::new(storage)
        }
        #[allow(unreachable_patterns)]
        other => {
            return Err(ServerError::UnsupportedProvider {
                kind: "storage",
                value: format!("{other} (is the feature enabled?)"),
            });
        }
    };

    info!(%provider, "file storage ready");
    Ok(storage)
}

#[cfg(any(feature = "aws", feature = "azure", feature = "gcp"))]
fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ServerError> {
    value.ok_or_else(|| ServerError::Config(format!("[storage] {field} is required")))
}
