use serde::{Deserialize, Serialize};

/// Configuration for the S3 storage backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct S3StorageConfig {
    /// AWS region (e.g. `"us-east-1"`).
    pub region: String,

    /// Bucket that holds the stored files.
    pub bucket: String,

    /// Optional key prefix for all objects (e.g. `"uploads"`).
    #[serde(default)]
    pub prefix: Option<String>,

    /// Optional endpoint URL override for local development (e.g. `LocalStack`
    /// or `MinIO`). Enables path-style addressing.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Static access key ID. When unset the environment credential chain is
    /// used.
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key, paired with `access_key_id`.
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for S3StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3StorageConfig")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl S3StorageConfig {
    /// Create a config for `bucket` in `region`.
    pub fn new(region: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            bucket: bucket.into(),
            prefix: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the endpoint URL override.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Use a static access key pair instead of the environment chain.
    #[must_use]
    pub fn with_static_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// The static key pair, if both halves are set.
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(secret)) => Some((id, secret)),
            _ => None,
        }
    }
}
