use std::path::PathBuf;

use serde::Deserialize;

/// Configuration for the file storage backend.
///
/// Only the fields of the selected provider are read.
#[derive(Deserialize)]
pub struct StorageConfig {
    /// Backend selector: `"local"`, `"aws"`, `"azure"` or `"gcp"`.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Root directory for the local backend.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    /// Bucket name (aws, gcp).
    pub bucket: Option<String>,

    /// Container name (azure).
    pub container: Option<String>,

    /// Object name prefix for the cloud backends.
    pub prefix: Option<String>,

    /// AWS region. Defaults to `"us-east-1"`.
    pub region: Option<String>,

    /// Endpoint override for S3-compatible or emulated services.
    pub endpoint_url: Option<String>,

    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,

    /// Azure storage account name.
    pub account: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Azure storage account access key. Preferred over the other Azure
    /// credentials when set.
    pub access_key: Option<String>,

    /// Path to a GCP service account key file.
    pub credentials_path: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("StorageConfig")
            .field("provider", &self.provider)
            .field("local_root", &self.local_root)
            .field("bucket", &self.bucket)
            .field("container", &self.container)
            .field("prefix", &self.prefix)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("account", &self.account)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &redact(&self.client_id))
            .field("client_secret", &redact(&self.client_secret))
            .field("access_key", &redact(&self.access_key))
            .field("credentials_path", &self.credentials_path)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            local_root: default_local_root(),
            bucket: None,
            container: None,
            prefix: None,
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            account: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_key: None,
            credentials_path: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_owned()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("_storage")
}
