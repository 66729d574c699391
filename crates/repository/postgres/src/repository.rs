use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use relay_core::{Clock, FileRecord, NewFileRecord};
use relay_repository::error::RepositoryError;
use relay_repository::repository::{ActivityCursor, FileRepository};

use crate::config::PostgresConfig;
use crate::migrations;

const COLUMNS: &str = "public_key, private_key, storage_path, mime_type, size, last_activity";

type FileRow = (String, String, String, String, i64, DateTime<Utc>);

fn from_row(row: FileRow) -> Result<FileRecord, RepositoryError> {
    let (public_key, private_key, storage_path, mime_type, size, last_activity) = row;
    let size = u64::try_from(size)
        .map_err(|e| RepositoryError::Serialization(format!("negative size {size}: {e}")))?;
    Ok(FileRecord {
        public_key,
        private_key,
        storage_path,
        mime_type,
        size,
        last_activity,
    })
}

fn backend(e: &sqlx::Error) -> RepositoryError {
    RepositoryError::BackendUnavailable(e.to_string())
}

/// Build `PgConnectOptions` from a [`PostgresConfig`], applying the SSL mode
/// when configured.
pub(crate) fn build_connect_options(
    config: &PostgresConfig,
) -> Result<sqlx::postgres::PgConnectOptions, RepositoryError> {
    let mut options: sqlx::postgres::PgConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| RepositoryError::BackendUnavailable(e.to_string()))?;

    if let Some(ref mode) = config.ssl_mode {
        let ssl_mode = match mode.as_str() {
            "disable" => sqlx::postgres::PgSslMode::Disable,
            "prefer" => sqlx::postgres::PgSslMode::Prefer,
            "require" => sqlx::postgres::PgSslMode::Require,
            "verify-ca" => sqlx::postgres::PgSslMode::VerifyCa,
            "verify-full" => sqlx::postgres::PgSslMode::VerifyFull,
            other => {
                return Err(RepositoryError::BackendUnavailable(format!(
                    "unknown ssl_mode: {other}"
                )));
            }
        };
        options = options.ssl_mode(ssl_mode);
    }

    Ok(options)
}

/// PostgreSQL-backed implementation of [`FileRepository`].
///
/// One row per file in `{schema}.{prefix}files`, with unique indexes on both
/// keys and a plain index on `last_activity`. Lookups and deletions use
/// `UPDATE … RETURNING` and `DELETE … RETURNING` so each is a single atomic
/// statement.
///
/// The pool connects lazily. Migrations run on first use and are retried on
/// every call until they succeed, so a database that is down at startup is
/// reported through [`FileRepository::is_live`] instead of aborting the
/// process.
pub struct PostgresFileRepository {
    pool: PgPool,
    config: Arc<PostgresConfig>,
    clock: Arc<dyn Clock>,
    schema_ready: OnceCell<()>,
}

impl PostgresFileRepository {
    /// Create a repository with its own lazily connecting pool.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::BackendUnavailable`] if the URL or SSL
    /// settings are invalid.
    pub fn new(config: PostgresConfig, clock: Arc<dyn Clock>) -> Result<Self, RepositoryError> {
        let connect_options = build_connect_options(&config)?;
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(connect_options);

        Ok(Self::from_pool(pool, config, clock))
    }

    /// Create a repository from an existing pool and config.
    pub fn from_pool(pool: PgPool, config: PostgresConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            clock,
            schema_ready: OnceCell::new(),
        }
    }

    /// Run migrations unless they have already succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::BackendUnavailable`] if the database cannot
    /// be reached or a DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        self.schema_ready
            .get_or_try_init(|| async {
                migrations::run_migrations(&self.pool, &self.config)
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "file repository migrations failed");
                        backend(&e)
                    })?;
                info!(table = %self.config.files_table(), "file repository schema ready");
                Ok::<(), RepositoryError>(())
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl FileRepository for PostgresFileRepository {
    async fn add(&self, record: NewFileRecord) -> Result<FileRecord, RepositoryError> {
        self.ensure_schema().await?;
        let table = self.config.files_table();
        let record = record.into_record(self.clock.now());
        let size = i64::try_from(record.size)
            .map_err(|e| RepositoryError::Serialization(format!("size too large: {e}")))?;

        let query = format!(
            "INSERT INTO {table} ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6)"
        );

        sqlx::query(&query)
            .bind(&record.public_key)
            .bind(&record.private_key)
            .bind(&record.storage_path)
            .bind(&record.mime_type)
            .bind(size)
            .bind(record.last_activity)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    RepositoryError::DuplicateKey(db.message().to_owned())
                }
                other => backend(&other),
            })?;

        Ok(record)
    }

    async fn get(&self, public_key: &str) -> Result<Option<FileRecord>, RepositoryError> {
        self.ensure_schema().await?;
        let table = self.config.files_table();

        let query = format!(
            "UPDATE {table} SET last_activity = GREATEST(last_activity, $2) \
             WHERE public_key = $1 \
             RETURNING {COLUMNS}"
        );

        let row: Option<FileRow> = sqlx::query_as(&query)
            .bind(public_key)
            .bind(self.clock.now())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(&e))?;

        row.map(from_row).transpose()
    }

    async fn delete(&self, private_key: &str) -> Result<Option<FileRecord>, RepositoryError> {
        self.ensure_schema().await?;
        let table = self.config.files_table();

        let query = format!("DELETE FROM {table} WHERE private_key = $1 RETURNING {COLUMNS}");

        let row: Option<FileRow> = sqlx::query_as(&query)
            .bind(private_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| backend(&e))?;

        row.map(from_row).transpose()
    }

    async fn list_inactive_after(
        &self,
        cutoff: DateTime<Utc>,
        after: Option<&ActivityCursor>,
        max: usize,
    ) -> Result<Vec<FileRecord>, RepositoryError> {
        self.ensure_schema().await?;
        let table = self.config.files_table();
        let limit = i64::try_from(max).unwrap_or(i64::MAX);

        let rows: Vec<FileRow> = if let Some(cursor) = after {
            let query = format!(
                "SELECT {COLUMNS} FROM {table} \
                 WHERE last_activity <= $1 \
                   AND (last_activity, public_key) > ($2, $3) \
                 ORDER BY last_activity ASC, public_key ASC \
                 LIMIT $4"
            );
            sqlx::query_as(&query)
                .bind(cutoff)
                .bind(cursor.last_activity)
                .bind(&cursor.public_key)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        } else {
            let query = format!(
                "SELECT {COLUMNS} FROM {table} \
                 WHERE last_activity <= $1 \
                 ORDER BY last_activity ASC, public_key ASC \
                 LIMIT $2"
            );
            sqlx::query_as(&query)
                .bind(cutoff)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
        }
        .map_err(|e| backend(&e))?;

        rows.into_iter().map(from_row).collect()
    }

    async fn is_live(&self) -> bool {
        if let Err(e) = self.ensure_schema().await {
            warn!(error = %e, "file repository not ready");
            return false;
        }
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "file repository ping failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use relay_core::ManualClock;

    use super::*;

    #[test]
    fn rejects_unknown_ssl_mode() {
        let config = PostgresConfig {
            ssl_mode: Some("sometimes".into()),
            ..PostgresConfig::default()
        };
        assert!(build_connect_options(&config).is_err());
    }

    #[test]
    fn row_with_negative_size_is_rejected() {
        let row: FileRow = (
            "p".into(),
            "s".into(),
            "b".into(),
            "text/plain".into(),
            -1,
            Utc::now(),
        );
        assert!(matches!(
            from_row(row),
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_database_is_not_live() {
        let config = PostgresConfig {
            url: "postgres://relay@127.0.0.1:1/relay".into(),
            acquire_timeout: std::time::Duration::from_millis(200),
            ..PostgresConfig::default()
        };
        let repo = PostgresFileRepository::new(config, Arc::new(ManualClock::starting_now()))
            .expect("lazy pool creation should succeed");

        assert!(!repo.is_live().await);
        assert!(matches!(
            repo.get("anything").await,
            Err(RepositoryError::BackendUnavailable(_))
        ));
    }
}
