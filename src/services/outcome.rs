//! Per-job row outcome counters
//!
//! Every row seen bumps `processed` and exactly one of success,
//! skip-no-identity, skip-bad-timestamp or error.

use crate::error::{RowError, RowErrorClass};
use crate::types::{IngestSummary, UpsertOutcome};

use super::upsert::RowEffects;

#[derive(Debug, Default)]
pub struct OutcomeAggregator {
    counts: IngestSummary,
}

impl OutcomeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_seen(&mut self) {
        self.counts.processed += 1;
    }

    pub fn skip_no_identity(&mut self) {
        self.counts.skipped_no_identity += 1;
    }

    pub fn skip_bad_timestamp(&mut self) {
        self.counts.skipped_bad_timestamp += 1;
    }

    pub fn success(&mut self, effects: RowEffects) {
        let c = &mut self.counts;
        c.success += 1;
        match effects.device {
            UpsertOutcome::Inserted => c.inserted_devices += 1,
            UpsertOutcome::Updated => c.updated_devices += 1,
        }
        match effects.uplink {
            UpsertOutcome::Inserted => c.inserted_uplinks += 1,
            UpsertOutcome::Updated => c.updated_uplinks += 1,
        }
        if effects.measurement_written {
            c.measurement_rows += 1;
        }
    }

    pub fn error(&mut self, err: &RowError) {
        self.counts.errors += 1;
        match err.class() {
            RowErrorClass::Storage => self.counts.errors_storage += 1,
            RowErrorClass::Other => self.counts.errors_other += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.counts.processed
    }

    pub fn errors(&self) -> u64 {
        self.counts.errors
    }

    /// Freeze the counters into a job summary
    pub fn into_summary(self, error: Option<String>, duration_ms: u64) -> IngestSummary {
        IngestSummary {
            ok: error.is_none(),
            error,
            duration_ms,
            ..self.counts
        }
    }
}
