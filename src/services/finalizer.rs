//! Job finalization
//!
//! After the transaction is settled the finalizer records the run, notifies
//! observers and moves committed files out of the inbound directory. Each of
//! these is best-effort: failures are logged and never change the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::notifier::Notifier;
use super::run_log::RunLog;
use crate::types::{CompletionEvent, FinalizeReport, IngestSummary, RunRecord};

/// How the job transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Committed,
    RolledBack,
}

pub struct JobFinalizer {
    run_log: Arc<dyn RunLog>,
    notifier: Arc<dyn Notifier>,
    processed_dir: PathBuf,
}

impl JobFinalizer {
    pub fn new(
        run_log: Arc<dyn RunLog>,
        notifier: Arc<dyn Notifier>,
        processed_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            run_log,
            notifier,
            processed_dir: processed_dir.into(),
        }
    }

    pub async fn finalize(
        &self,
        source: &Path,
        settlement: Settlement,
        summary: &IngestSummary,
    ) -> FinalizeReport {
        let file_name = file_name(source);
        let mut report = FinalizeReport::default();

        let record = RunRecord {
            file_name: file_name.clone(),
            path: source.display().to_string(),
            run_at: Utc::now(),
            ok: summary.ok,
            outcome: summary.clone(),
        };
        match self.run_log.append(&record).await {
            Ok(()) => report.logged = true,
            Err(e) => {
                warn!("Failed to write {} run log for '{}': {:#}", self.run_log.name(), file_name, e);
                report.log_error = Some(format!("{:#}", e));
            }
        }

        let event = CompletionEvent::csv_completed(&file_name, summary);
        match self.notifier.notify(&event).await {
            Ok(()) => report.notified = true,
            Err(e) => warn!("Failed to send {} notification for '{}': {:#}", self.notifier.name(), file_name, e),
        }

        match settlement {
            Settlement::Committed => match relocate(source, &self.processed_dir).await {
                Ok(target) => {
                    info!("File processed and moved to {}", target.display());
                    report.moved_to = Some(target);
                }
                Err(e) => warn!(
                    "Failed to move '{}' to {}: {}",
                    source.display(),
                    self.processed_dir.display(),
                    e
                ),
            },
            Settlement::RolledBack => {
                info!("Processing failed: '{}' left in place", source.display());
            }
        }

        report
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Move `source` into `dir`, keeping its base name.
async fn relocate(source: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = source.file_name().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "source path has no file name")
    })?;
    let target = dir.join(name);

    if tokio::fs::rename(source, &target).await.is_err() {
        // rename fails across filesystems; fall back to copy + delete
        tokio::fs::copy(source, &target).await?;
        tokio::fs::remove_file(source).await?;
    }
    Ok(target)
}
