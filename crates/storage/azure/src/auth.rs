use std::sync::Arc;

use azure_core::credentials::{Secret, TokenCredential};
use azure_storage_blob::BlobServiceClient;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use relay_storage::error::StorageError;
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::AzureBlobStorageConfig;

type HmacSha256 = Hmac<Sha256>;

/// Storage service version the account SAS is signed for.
const SAS_VERSION: &str = "2022-11-02";
/// Read, write, delete, list and create, in the order the service expects.
const SAS_PERMISSIONS: &str = "rwdlc";
/// Blob service only.
const SAS_SERVICES: &str = "b";
/// Service, container and object level operations.
const SAS_RESOURCE_TYPES: &str = "sco";
/// Hours an account SAS stays valid. Each client built from an access key
/// is signed anew.
const SAS_LIFETIME_HOURS: i64 = 1;

/// RFC 3986 unreserved characters stay as they are.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// How requests to the blob service are authorized.
pub(crate) enum BlobAuth {
    /// Entra ID token from a service principal or the Azure CLI login.
    Token(Arc<dyn TokenCredential>),
    /// Shared account key, presented as a short-lived account SAS.
    AccessKey(AccountKey),
}

impl BlobAuth {
    /// Pick the credential the config asks for: the access key when set,
    /// then a service principal, then the Azure CLI login.
    pub(crate) fn from_config(config: &AzureBlobStorageConfig) -> Result<Self, StorageError> {
        if let Some(access_key) = &config.access_key {
            info!(account = %config.account, "using storage account access key for Azure Blob");
            return Ok(Self::AccessKey(AccountKey::new(&config.account, access_key)?));
        }

        Ok(Self::Token(token_credential(config)?))
    }

    /// A service client for `endpoint`, signed with a fresh SAS when the
    /// access key is in use.
    pub(crate) fn service_client(&self, endpoint: &str) -> Result<BlobServiceClient, StorageError> {
        let client = match self {
            Self::Token(credential) => {
                BlobServiceClient::new(endpoint, Some(Arc::clone(credential)), None)
            }
            Self::AccessKey(key) => {
                let https_only = !endpoint.starts_with("http://");
                let expiry = Utc::now() + TimeDelta::hours(SAS_LIFETIME_HOURS);
                let sas = key.account_sas(expiry, https_only)?;
                let endpoint = format!("{}/?{sas}", endpoint.trim_end_matches('/'));
                BlobServiceClient::new(&endpoint, None, None)
            }
        };
        client.map_err(|e| StorageError::Configuration(format!("blob client error: {e}")))
    }
}

fn token_credential(
    config: &AzureBlobStorageConfig,
) -> Result<Arc<dyn TokenCredential>, StorageError> {
    if let (Some(tenant_id), Some(client_id), Some(client_secret)) =
        (&config.tenant_id, &config.client_id, &config.client_secret)
    {
        info!("using service-principal credentials for Azure Blob");
        debug!(tenant_id = %tenant_id, "building ClientSecretCredential");
        let credential = azure_identity::ClientSecretCredential::new(
            tenant_id,
            client_id.clone(),
            Secret::new(client_secret.clone()),
            None,
        )
        .map_err(|e| StorageError::Configuration(format!("azure credential: {e}")))?;
        Ok(credential)
    } else {
        info!("using AzureCliCredential for Azure Blob");
        let credential = azure_identity::AzureCliCredential::new(None)
            .map_err(|e| StorageError::Configuration(format!("azure credential: {e}")))?;
        Ok(credential)
    }
}

/// A decoded storage account access key.
pub(crate) struct AccountKey {
    account: String,
    key: Vec<u8>,
}

impl AccountKey {
    pub(crate) fn new(account: &str, encoded: &str) -> Result<Self, StorageError> {
        let key = STANDARD.decode(encoded.trim()).map_err(|e| {
            StorageError::Configuration(format!("azure access key is not valid base64: {e}"))
        })?;
        Ok(Self {
            account: account.to_owned(),
            key,
        })
    }

    /// Query string of an account SAS covering blob reads and writes until
    /// `expiry`.
    pub(crate) fn account_sas(
        &self,
        expiry: DateTime<Utc>,
        https_only: bool,
    ) -> Result<String, StorageError> {
        let expiry = expiry.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let protocol = if https_only { "https" } else { "https,http" };
        // Start time, IP range and encryption scope are left empty.
        let string_to_sign = format!(
            "{}\n{SAS_PERMISSIONS}\n{SAS_SERVICES}\n{SAS_RESOURCE_TYPES}\n\n{expiry}\n\n{protocol}\n{SAS_VERSION}\n\n",
            self.account
        );

        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| StorageError::Configuration(format!("invalid azure access key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        let encode = |value: &str| utf8_percent_encode(value, QUERY_VALUE).to_string();
        Ok(format!(
            "sv={SAS_VERSION}&ss={SAS_SERVICES}&srt={SAS_RESOURCE_TYPES}&sp={SAS_PERMISSIONS}&se={}&spr={}&sig={}",
            encode(&expiry),
            encode(protocol),
            encode(&signature)
        ))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn expiry() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn account_sas_matches_reference_signature() {
        // "relay-test-key", base64 encoded.
        let key = AccountKey::new("relayfiles", "cmVsYXktdGVzdC1rZXk=").unwrap();
        let sas = key.account_sas(expiry(), true).unwrap();
        assert_eq!(
            sas,
            "sv=2022-11-02&ss=b&srt=sco&sp=rwdlc&se=2030-01-01T00%3A00%3A00Z&spr=https\
             &sig=J9tKSjOzGVO5ooY1rrFWybK8twvsSFjRGpID63%2Fmux0%3D"
        );
    }

    #[test]
    fn plain_http_endpoints_allow_http() {
        let key = AccountKey::new("devstoreaccount1", "cmVsYXktdGVzdC1rZXk=").unwrap();
        let sas = key.account_sas(expiry(), false).unwrap();
        assert!(sas.contains("&spr=https%2Chttp&"));
    }

    #[test]
    fn malformed_access_key_is_a_configuration_error() {
        assert!(matches!(
            AccountKey::new("relayfiles", "not base64!"),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn access_key_takes_precedence() {
        let config = AzureBlobStorageConfig::new("relayfiles", "uploads")
            .with_service_principal("tid", "cid", "secret")
            .with_access_key("cmVsYXktdGVzdC1rZXk=");
        assert!(matches!(
            BlobAuth::from_config(&config),
            Ok(BlobAuth::AccessKey(_))
        ));
    }

    #[test]
    fn access_key_client_builds_without_network() {
        let config = AzureBlobStorageConfig::new("relayfiles", "uploads")
            .with_access_key("cmVsYXktdGVzdC1rZXk=");
        let auth = BlobAuth::from_config(&config).unwrap();
        assert!(auth.service_client(&config.endpoint()).is_ok());
    }
}
