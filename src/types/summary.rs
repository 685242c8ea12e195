//! Job outcome summary, audit record and completion event

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of one ingestion job, returned to the queue and sent to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub ok: bool,
    pub processed: u64,
    pub success: u64,
    pub inserted_devices: u64,
    pub updated_devices: u64,
    pub inserted_uplinks: u64,
    pub updated_uplinks: u64,
    pub measurement_rows: u64,
    pub errors: u64,
    pub errors_storage: u64,
    pub errors_other: u64,
    pub skipped_no_identity: u64,
    pub skipped_bad_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl IngestSummary {
    /// Rows that were neither failed nor skipped for being broken.
    pub fn valid_rows(&self) -> u64 {
        self.processed.saturating_sub(self.errors)
    }
}

/// Append-only audit entry for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub file_name: String,
    pub path: String,
    pub run_at: DateTime<Utc>,
    pub ok: bool,
    pub outcome: IngestSummary,
}

/// Event fanned out to dashboards when a file finishes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub valid_rows: u64,
    pub summary: IngestSummary,
    pub text: String,
}

impl CompletionEvent {
    pub fn csv_completed(file_name: &str, summary: &IngestSummary) -> Self {
        let valid_rows = summary.valid_rows();
        let text = if summary.ok {
            format!(
                "CSV processed: {} valid rows, {} uplinks, {} measurements.",
                valid_rows, summary.inserted_uplinks, summary.measurement_rows
            )
        } else {
            format!(
                "CSV '{}' failed: {}",
                file_name,
                summary.error.as_deref().unwrap_or("unknown error")
            )
        };

        Self {
            event_type: "CSV_COMPLETED".to_string(),
            source: "worker".to_string(),
            timestamp: Utc::now(),
            file_name: file_name.to_string(),
            valid_rows,
            summary: summary.clone(),
            text,
        }
    }
}

/// What finalization managed to do after the transaction settled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeReport {
    pub logged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_error: Option<String>,
    pub notified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<PathBuf>,
}
