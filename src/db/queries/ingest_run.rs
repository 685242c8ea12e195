//! Audit trail of ingestion runs

use anyhow::Result;
use sqlx::PgPool;

use crate::types::RunRecord;

/// Append one run record. Runs on its own pool connection, outside any job transaction.
pub async fn insert_run(pool: &PgPool, record: &RunRecord) -> Result<i64> {
    let outcome = serde_json::to_value(&record.outcome)?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO ingest_runs (file_name, path, run_at, ok, outcome)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(&record.file_name)
    .bind(&record.path)
    .bind(record.run_at)
    .bind(record.ok)
    .bind(outcome)
    .fetch_one(pool)
    .await?;

    Ok(id)
}
