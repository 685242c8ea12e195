//! Database module

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod queries;
pub mod store;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create a database connection pool.
///
/// Each running job holds one connection for its whole transaction, so the
/// pool is sized for the job concurrency plus room for audit writes.
pub async fn create_pool(database_url: &str, max_concurrent_jobs: usize) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections((max_concurrent_jobs as u32).saturating_mul(2).max(4))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    let migrator = sqlx::migrate!("./migrations");

    let compiled_versions: Vec<i64> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .collect();
    info!("Compiled migration versions: {:?}", compiled_versions);

    migrator.run(pool).await?;

    info!("Database migrations complete");
    Ok(())
}
