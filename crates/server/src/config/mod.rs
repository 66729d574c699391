mod env;
mod gc;
mod providers;
mod rate_limit;
mod repository;
mod server;
mod storage;


pub use gc::*;
pub use providers::*;
pub use rate_limit::*;
pub use repository::*;
pub use server::*;
pub use storage::*;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the relay server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    /// HTTP server bind and upload settings.
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Daily quota configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// File metadata backend.
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// File content backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Inactive file eviction.
    #[serde(default)]
    pub gc: GcServerConfig,
}

impl RelayConfig {
    /// Check the configuration and resolve the backend selectors.
    ///
    /// Fails on the first problem found, before anything is built.
    pub fn validate(&self) -> Result<Providers, ServerError> {
        if self.rate_limit.max_daily_uploads < 1 {
            return Err(ServerError::Config(
                "[rate_limit] max_daily_uploads must be at least 1".into(),
            ));
        }
        if self.rate_limit.max_daily_downloads < 1 {
            return Err(ServerError::Config(
                "[rate_limit] max_daily_downloads must be at least 1".into(),
            ));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ServerError::Config(
                "[server] max_upload_bytes must be positive".into(),
            ));
        }

        let providers = Providers {
            rate_limit: self.rate_limit.provider.parse()?,
            repository: self.repository.provider.parse()?,
            storage: self.storage.provider.parse()?,
        };

        if providers.rate_limit == RateLimitProvider::Redis && self.rate_limit.url.is_none() {
            return Err(missing("rate_limit", "url (REDIS_URI)"));
        }
        if providers.repository == RepositoryProvider::Postgres && self.repository.url.is_none() {
            return Err(missing("repository", "url (DATABASE_URL)"));
        }
        match providers.storage {
            StorageProvider::Local => {}
            StorageProvider::Aws | StorageProvider::Gcp => {
                if self.storage.bucket.is_none() {
                    return Err(missing("storage", "bucket"));
                }
            }
            StorageProvider::Azure => {
                if self.storage.account.is_none() {
                    return Err(missing("storage", "account (AZ_STORAGE_ACCOUNT_NAME)"));
                }
                if self.storage.container.is_none() {
                    return Err(missing("storage", "container (AZ_STORAGE_CONTAINER)"));
                }
            }
        }

        if self.gc.page_size == 0 {
            return Err(ServerError::Config(
                "[gc] page_size must be positive".into(),
            ));
        }
        // Parses both the schedule and the inactivity duration.
        self.gc.to_gc_config()?;

        Ok(providers)
    }
}

fn missing(section: &str, field: &str) -> ServerError {
    ServerError::Config(format!("[{section}] {field} is required by the selected provider"))
}
