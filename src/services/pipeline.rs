//! CSV ingestion pipeline
//!
//! One call to [`IngestPipeline::run`] ingests one file inside one storage
//! transaction:
//! 1. Open the file and begin the transaction (failures abort the job)
//! 2. Stream rows in file order, resolving identity and timestamp
//! 3. Write each row under its own savepoint so a failed row is undone alone
//! 4. Commit at end of stream, or roll everything back on a fatal error
//! 5. Hand the summary to the finalizer (audit, notify, move the file)

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::decoder::RecordDecoder;
use super::finalizer::{JobFinalizer, Settlement};
use super::identity::IdentityResolver;
use super::outcome::OutcomeAggregator;
use super::parsers::parse_timestamp;
use super::upsert::{apply_row, build_row};
use crate::db::store::{IngestStore, JobTransaction};
use crate::defaults::MAX_LOGGED_ROW_ERRORS;
use crate::error::{IngestError, RowError};
use crate::types::{DecodedRow, FinalizeReport, IngestSummary};

pub struct IngestPipeline {
    store: Arc<dyn IngestStore>,
    finalizer: Arc<JobFinalizer>,
    delimiter: u8,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn IngestStore>, finalizer: Arc<JobFinalizer>, delimiter: u8) -> Self {
        Self {
            store,
            finalizer,
            delimiter,
        }
    }

    /// Ingest one file and finalize it. Failures are reported in the summary.
    pub async fn run(&self, path: &Path) -> IngestSummary {
        self.run_job(path).await.0
    }

    /// Like [`run`](Self::run), also returning what finalization achieved.
    pub async fn run_job(&self, path: &Path) -> (IngestSummary, FinalizeReport) {
        let started = Instant::now();
        info!("Processing CSV '{}' using {} store", path.display(), self.store.name());

        let mut outcome = OutcomeAggregator::new();
        let result = self.ingest(path, &mut outcome).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (settlement, error) = match result {
            Ok(()) => (Settlement::Committed, None),
            Err(e) => {
                error!("Ingestion of '{}' rolled back: {}", path.display(), e);
                (Settlement::RolledBack, Some(e.to_string()))
            }
        };

        let summary = outcome.into_summary(error, duration_ms);
        info!(
            "CSV '{}' finished in {} ms: ok={} processed={} success={} errors={} (storage={}, other={}) skipped_no_identity={} skipped_bad_timestamp={}",
            path.display(),
            summary.duration_ms,
            summary.ok,
            summary.processed,
            summary.success,
            summary.errors,
            summary.errors_storage,
            summary.errors_other,
            summary.skipped_no_identity,
            summary.skipped_bad_timestamp,
        );

        let report = self.finalizer.finalize(path, settlement, &summary).await;
        (summary, report)
    }

    async fn ingest(&self, path: &Path, outcome: &mut OutcomeAggregator) -> Result<(), IngestError> {
        let mut decoder = RecordDecoder::open(path, self.delimiter).await?;
        let mut tx = self
            .store
            .begin()
            .await
            .map_err(IngestError::StoreUnavailable)?;

        match process_rows(&mut decoder, tx.as_mut(), outcome).await {
            Ok(()) => {
                tx.commit().await.map_err(IngestError::Commit)?;
                debug!("Committed {} rows from '{}'", outcome.processed(), path.display());
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback of '{}' failed: {}", path.display(), rollback_err);
                }
                Err(e)
            }
        }
    }
}

async fn process_rows(
    decoder: &mut RecordDecoder,
    tx: &mut dyn JobTransaction,
    outcome: &mut OutcomeAggregator,
) -> Result<(), IngestError> {
    let mut identity = IdentityResolver::new();

    while let Some(item) = decoder.next().await {
        let DecodedRow { line, record } = item?;
        outcome.row_seen();

        let Some(dev_eui) = identity.resolve(record.device_identifier(), record.device_address())
        else {
            debug!("Line {}: no device identity, skipped", line);
            outcome.skip_no_identity();
            continue;
        };

        let Some(time) = parse_timestamp(record.time.as_deref()) else {
            debug!("Line {}: unparseable time {:?}, skipped", line, record.time);
            outcome.skip_bad_timestamp();
            continue;
        };

        let row = build_row(dev_eui, time, &record);

        tx.savepoint().await.map_err(IngestError::StoreLost)?;
        match apply_row(tx, &row).await {
            Ok(effects) => {
                tx.release_savepoint().await.map_err(IngestError::StoreLost)?;
                outcome.success(effects);
            }
            Err(e) => {
                outcome.error(&e);
                let errors = outcome.errors();
                if matches!(&e, RowError::Storage(se) if se.is_connectivity()) {
                    error!("Line {}: storage connection problem: {}", line, e);
                } else if errors <= MAX_LOGGED_ROW_ERRORS {
                    warn!("Line {} (device {}) failed: {}", line, row.device.dev_eui, e);
                } else if errors == MAX_LOGGED_ROW_ERRORS + 1 {
                    warn!("More than {} row errors, further ones are only counted", MAX_LOGGED_ROW_ERRORS);
                }
                tx.rollback_to_savepoint().await.map_err(IngestError::StoreLost)?;
            }
        }
    }

    debug!("Resolved {} device addresses", identity.known_addresses());
    Ok(())
}
