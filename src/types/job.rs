//! Queue payloads for CSV ingestion jobs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{FinalizeReport, IngestSummary};

/// A job as delivered by the queue. Producers may send just `{"file_path": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvJob {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub file_path: PathBuf,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

impl CsvJob {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_path: file_path.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// Task result published back once a job is finalized
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvJobResult {
    pub job_id: Uuid,
    pub file_path: PathBuf,
    pub summary: IngestSummary,
    /// Whether the run was audited, notified and moved
    pub finalization: FinalizeReport,
    pub completed_at: DateTime<Utc>,
}

impl CsvJobResult {
    pub fn new(job: &CsvJob, summary: IngestSummary, finalization: FinalizeReport) -> Self {
        Self {
            job_id: job.id,
            file_path: job.file_path.clone(),
            summary,
            finalization,
            completed_at: Utc::now(),
        }
    }
}
