use std::sync::Arc;

use relay_core::Clock;
use relay_repository::FileRepository;
use relay_repository_memory::MemoryFileRepository;
#[cfg(feature = "postgres")]
use relay_repository_postgres::{PostgresConfig, PostgresFileRepository};
use tracing::info;

use crate::config::{RepositoryConfig, RepositoryProvider};
use crate::error::ServerError;

/// Create a file repository for the selected provider.
///
/// The Postgres pool connects lazily and runs its migrations on first use,
/// so an unreachable database does not prevent startup.
#[allow(clippy::unused_async)]
pub async fn create_repository(
    provider: RepositoryProvider,
    config: &RepositoryConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn FileRepository>, ServerError> {
    let repository: Arc<dyn FileRepository> = match provider {
        RepositoryProvider::InMemory => Arc::new(MemoryFileRepository::new(clock)),
        #[cfg(feature = "postgres")]
        RepositoryProvider::Postgres => {
            let url = config.url.as_deref().ok_or_else(|| {
                ServerError::Config("postgres repository requires [repository] url".into())
            })?;
            let mut pg_config = PostgresConfig {
                url: url.to_owned(),
                ..PostgresConfig::default()
            };
            if let Some(pool_size) = config.pool_size {
                pg_config.pool_size = pool_size;
            }
            if let Some(schema) = &config.schema {
                pg_config.schema.clone_from(schema);
            }
            if let Some(prefix) = &config.table_prefix {
                pg_config.table_prefix.clone_from(prefix);
            }

            let repository = PostgresFileRepository::new(pg_config, clock)
                .map_err(|e| ServerError::Backend(format!("postgres repository: {e}")))?;
            if let Err(e) = repository.ensure_schema().await {
                tracing::warn!(error = %e, "database not ready, migrations will be retried");
            }
            Arc::new(repository)
        }
        #[cfg(not(feature = "postgres"))]
        RepositoryProvider::Postgres => {
            let _ = config;
            return Err(ServerError::UnsupportedProvider {
                kind: "repository",
                value: "postgres (is the feature enabled?)".into(),
            });
        }
    };

    info!(%provider, "file repository ready");
    Ok(repository)
}
