use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating the files table and its indexes if they
/// do not exist.
///
/// Every statement uses `IF NOT EXISTS`, so running this against an already
/// migrated database is a no-op.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let files_table = config.files_table();

    let create_files = format!(
        "CREATE TABLE IF NOT EXISTS {files_table} (
            public_key TEXT NOT NULL,
            private_key TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            mime_type TEXT NOT NULL,
            size BIGINT NOT NULL,
            last_activity TIMESTAMPTZ NOT NULL
        )"
    );

    let create_public_idx = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {files_table} (public_key)",
        config.index_name("public_key")
    );

    let create_private_idx = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {files_table} (private_key)",
        config.index_name("private_key")
    );

    let create_activity_idx = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {files_table} (last_activity)",
        config.index_name("last_activity")
    );

    sqlx::query(&create_files).execute(pool).await?;
    sqlx::query(&create_public_idx).execute(pool).await?;
    sqlx::query(&create_private_idx).execute(pool).await?;
    sqlx::query(&create_activity_idx).execute(pool).await?;

    Ok(())
}
