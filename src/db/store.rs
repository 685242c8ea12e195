//! Storage seam used by the ingestion pipeline
//!
//! One `JobTransaction` is opened per job and owned by that job alone. Row
//! writes are wrapped in a savepoint so a single failing row can be undone
//! without losing the rest of the batch.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{DeviceUpsert, MeasurementUpsert, UplinkKey, UplinkUpsert, UpsertOutcome};

/// Structural classification of a storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Unique/foreign key/check/not-null violation or bad data for a column
    Constraint,
    /// Connection refused, dropped, timed out or pool exhausted
    Connectivity,
    Other,
}

#[derive(Debug, Error)]
#[error("{kind:?} storage error: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        self.kind == StoreErrorKind::Connectivity
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db) => match db.kind() {
                sqlx::error::ErrorKind::UniqueViolation
                | sqlx::error::ErrorKind::ForeignKeyViolation
                | sqlx::error::ErrorKind::NotNullViolation
                | sqlx::error::ErrorKind::CheckViolation => StoreErrorKind::Constraint,
                // SQLSTATE class 22: data exception (out of range, bad format)
                _ if db.code().is_some_and(|c| c.starts_with("22")) => StoreErrorKind::Constraint,
                // SQLSTATE class 08: connection exception
                _ if db.code().is_some_and(|c| c.starts_with("08")) => StoreErrorKind::Connectivity,
                _ => StoreErrorKind::Other,
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreErrorKind::Connectivity,
            _ => StoreErrorKind::Other,
        };

        Self::new(kind, err.to_string())
    }
}

/// Factory for per-job transactions
#[async_trait]
pub trait IngestStore: Send + Sync {
    /// Acquire a dedicated connection and open the job transaction.
    async fn begin(&self) -> Result<Box<dyn JobTransaction>, StoreError>;

    /// Name of this backend for logging
    fn name(&self) -> &'static str;
}

/// Writes issued against one open job transaction
#[async_trait]
pub trait JobTransaction: Send {
    async fn savepoint(&mut self) -> Result<(), StoreError>;
    async fn release_savepoint(&mut self) -> Result<(), StoreError>;
    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError>;

    async fn upsert_device(&mut self, device: &DeviceUpsert) -> Result<UpsertOutcome, StoreError>;
    async fn upsert_uplink(&mut self, uplink: &UplinkUpsert) -> Result<UpsertOutcome, StoreError>;
    /// Surrogate id of the uplink stored under `key`, if any
    async fn find_uplink_id(&mut self, key: &UplinkKey) -> Result<Option<i64>, StoreError>;
    async fn upsert_measurement(
        &mut self,
        measurement: &MeasurementUpsert,
    ) -> Result<UpsertOutcome, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
