use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use futures::stream;
use tracing::{debug, error, info, instrument, warn};

use relay_storage::error::StorageError;
use relay_storage::key::{check_key, new_object_key, prefixed};
use relay_storage::storage::{ByteStream, FileStorage};

use crate::auth::build_client;
use crate::config::S3StorageConfig;
use crate::error::classify_sdk_error;

/// Amazon S3 implementation of [`FileStorage`].
pub struct S3FileStorage {
    config: S3StorageConfig,
    client: aws_sdk_s3::Client,
}

impl std::fmt::Debug for S3FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3FileStorage")
            .field("config", &self.config)
            .field("client", &"<S3Client>")
            .finish()
    }
}

impl S3FileStorage {
    /// Create a new `S3FileStorage` by building an AWS SDK client.
    pub async fn new(config: S3StorageConfig) -> Self {
        let client = build_client(&config).await;
        Self { config, client }
    }

    /// Create an `S3FileStorage` with a pre-built client.
    pub fn with_client(config: S3StorageConfig, client: aws_sdk_s3::Client) -> Self {
        Self { config, client }
    }

    fn object_key(&self, key: &str) -> Result<String, StorageError> {
        Ok(prefixed(self.config.prefix.as_deref(), check_key(key)?))
    }
}

/// Adapt an S3 response body into the storage byte stream.
fn body_stream(key: String, body: S3Body) -> ByteStream {
    Box::pin(stream::unfold(
        (key, body),
        |(key, mut body)| async move {
            let chunk = body.next().await?;
            let chunk = chunk.map_err(|e| {
                StorageError::BackendUnavailable(format!("reading {key} from S3: {e}"))
            });
            Some((chunk, (key, body)))
        },
    ))
}

#[async_trait]
impl FileStorage for S3FileStorage {
    #[instrument(skip(self, source), fields(backend = "aws-s3"))]
    async fn put(&self, source: &Path) -> Result<String, StorageError> {
        let key = new_object_key();
        let object_key = self.object_key(&key)?;
        let body = S3Body::from_path(source)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;

        debug!(bucket = %self.config.bucket, key = %object_key, "uploading object to S3");
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, "S3 put_object failed");
                classify_sdk_error(&key, &err_str)
            })?;

        info!(bucket = %self.config.bucket, key = %object_key, "S3 object uploaded");
        Ok(key)
    }

    #[instrument(skip(self), fields(backend = "aws-s3"))]
    async fn load(&self, key: &str) -> Result<ByteStream, StorageError> {
        let object_key = self.object_key(key)?;

        let output = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error()
                    .is_some_and(GetObjectError::is_no_such_key)
                {
                    return StorageError::NotFound(key.to_owned());
                }
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, "S3 get_object failed");
                classify_sdk_error(key, &err_str)
            })?;

        Ok(body_stream(key.to_owned(), output.body))
    }

    #[instrument(skip(self), fields(backend = "aws-s3"))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let object_key = self.object_key(key)?;

        // S3 reports success for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .send()
            .await
            .map_err(|e| {
                let err_str = DisplayErrorContext(&e).to_string();
                error!(error = %err_str, "S3 delete_object failed");
                match classify_sdk_error(key, &err_str) {
                    StorageError::NotFound(_) => StorageError::BackendUnavailable(err_str),
                    other => other,
                }
            })?;

        debug!(bucket = %self.config.bucket, key = %object_key, "S3 object deleted");
        Ok(())
    }

    async fn is_live(&self) -> bool {
        match self
            .client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!(bucket = %self.config.bucket, error = %DisplayErrorContext(&e), "S3 bucket unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> aws_sdk_s3::Client {
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }

    #[test]
    fn object_key_applies_prefix() {
        let storage = S3FileStorage::with_client(
            S3StorageConfig::new("us-east-1", "files").with_prefix("uploads/"),
            offline_client(),
        );
        assert_eq!(storage.object_key("abc").unwrap(), "uploads/abc");
    }

    #[test]
    fn object_key_rejects_traversal() {
        let storage =
            S3FileStorage::with_client(S3StorageConfig::new("us-east-1", "files"), offline_client());
        assert!(matches!(
            storage.object_key("../abc"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
