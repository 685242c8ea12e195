//! Run log (audit sink)
//!
//! One record per finished job, appended and never updated. The record is
//! written outside the job transaction so a rolled-back run is still logged.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::db::queries;
use crate::types::RunRecord;

#[async_trait]
pub trait RunLog: Send + Sync {
    async fn append(&self, record: &RunRecord) -> Result<()>;

    /// Name of this sink for logging
    fn name(&self) -> &'static str;
}

/// Run log stored in the `ingest_runs` table
pub struct PgRunLog {
    pool: PgPool,
}

impl PgRunLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunLog for PgRunLog {
    async fn append(&self, record: &RunRecord) -> Result<()> {
        queries::ingest_run::insert_run(&self.pool, record).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Run log kept as a JSON-lines file, one record per line
pub struct JsonlRunLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlRunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl RunLog for JsonlRunLog {
    async fn append(&self, record: &RunRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create run log directory {}", dir.display()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open run log {}", self.path.display()))?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
