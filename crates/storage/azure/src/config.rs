use serde::{Deserialize, Serialize};

/// Configuration for the Azure Blob Storage backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct AzureBlobStorageConfig {
    /// Storage account name.
    pub account: String,

    /// Container that holds the stored files.
    pub container: String,

    /// Optional blob name prefix.
    #[serde(default)]
    pub prefix: Option<String>,

    /// Optional endpoint URL override for local development (e.g. `Azurite`).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Azure AD tenant ID.
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Azure AD application (client) ID.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Azure AD client secret. Redacted in `Debug`.
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Base64 storage account access key. Takes precedence over every other
    /// credential. Redacted in `Debug`.
    #[serde(default)]
    pub access_key: Option<String>,
}

impl std::fmt::Debug for AzureBlobStorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobStorageConfig")
            .field("account", &self.account)
            .field("container", &self.container)
            .field("prefix", &self.prefix)
            .field("endpoint_url", &self.endpoint_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id.as_ref().map(|_| "[REDACTED]"))
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AzureBlobStorageConfig {
    /// Create a config for `container` in storage account `account`.
    pub fn new(account: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            container: container.into(),
            prefix: None,
            endpoint_url: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_key: None,
        }
    }

    /// Set the blob name prefix.
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

    /// Authenticate as a service principal.
    #[must_use]
    pub fn with_service_principal(
        mut self,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Authenticate with the storage account access key.
    #[must_use]
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    /// Blob service endpoint, honouring the override.
    pub fn endpoint(&self) -> String {
        self.endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.blob.core.windows.net", self.account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_defaults_to_public_cloud() {
        let config = AzureBlobStorageConfig::new("relayfiles", "uploads");
        assert_eq!(config.endpoint(), "https://relayfiles.blob.core.windows.net");
    }

    #[test]
    fn endpoint_override_wins() {
        let config = AzureBlobStorageConfig::new("devstoreaccount1", "uploads")
            .with_endpoint_url("http://127.0.0.1:10000/devstoreaccount1");
        assert_eq!(config.endpoint(), "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AzureBlobStorageConfig::new("acct", "c").with_service_principal(
            "tid-123",
            "cid-456",
            "very-secret",
        );
        let config = config.with_access_key("a2V5LWJ5dGVz");
        let debug = format!("{config:?}");
        assert!(debug.contains("tid-123"));
        assert!(!debug.contains("a2V5LWJ5dGVz"));
        assert!(!debug.contains("cid-456"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn deserializes_minimal_table() {
        let config: AzureBlobStorageConfig =
            serde_json::from_str(r#"{"account":"a","container":"c"}"#).unwrap();
        assert!(config.client_secret.is_none());
        assert!(config.prefix.is_none());
    }
}
