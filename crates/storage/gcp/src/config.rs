use relay_storage::error::StorageError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configuration for the Google Cloud Storage backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct GcsStorageConfig {
    /// Bucket that holds the stored files.
    pub bucket: String,

    /// Optional object name prefix.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Path to a service account JSON key file. When neither this nor
    /// `credentials_json` is set, Application Default Credentials are used.
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// Inline service account JSON key. Redacted in `Debug`.
    #[serde(default)]
    pub credentials_json: Option<String>,

    /// Optional endpoint URL override (e.g. a fake GCS server).
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for GcsStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcsStorageConfig")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("credentials_path", &self.credentials_path)
            .field(
                "credentials_json",
                &self.credentials_json.as_ref().map(|_| "[REDACTED]"),
            )
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl GcsStorageConfig {
    /// Create a config for `bucket` using Application Default Credentials.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: None,
            credentials_path: None,
            credentials_json: None,
            endpoint_url: None,
        }
    }

    /// Set the object name prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Load service account credentials from a key file.
    #[must_use]
    pub fn with_credentials_path(mut self, path: impl Into<String>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Set the endpoint URL override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// The service account key to authenticate with, or `None` for
    /// Application Default Credentials. Inline JSON wins over a key file.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Configuration`] if the key file cannot be
    /// read, is not JSON, or is not a service account key.
    pub async fn service_account_key(&self) -> Result<Option<serde_json::Value>, StorageError> {
        let (source, content) = if let Some(json) = &self.credentials_json {
            ("inline credentials_json".to_owned(), json.clone())
        } else if let Some(path) = &self.credentials_path {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                StorageError::Configuration(format!("failed to read GCP key file '{path}': {e}"))
            })?;
            (format!("key file '{path}'"), content)
        } else {
            info!(bucket = %self.bucket, "using Application Default Credentials for GCS");
            return Ok(None);
        };

        let key: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            StorageError::Configuration(format!("GCP {source} is not valid JSON: {e}"))
        })?;
        if key.get("type").and_then(serde_json::Value::as_str) != Some("service_account") {
            return Err(StorageError::Configuration(format!(
                "GCP {source} is not a service account key"
            )));
        }
        info!(bucket = %self.bucket, %source, "using service account key for GCS");
        Ok(Some(key))
    }

    /// Cloud Storage v2 resource path of the bucket.
    pub fn bucket_path(&self) -> String {
        format!("projects/_/buckets/{}", self.bucket)
    }
}
