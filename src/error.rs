//! Error taxonomy of an ingestion job
//!
//! `IngestError` aborts the whole job and rolls its transaction back.
//! `RowError` is counted against one row and processing continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::db::store::{StoreError, StoreErrorKind};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source file not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("cannot read source file {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("storage unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("failed reading CSV at line {line}: {message}")]
    StreamRead { line: u64, message: String },

    #[error("storage connection lost: {0}")]
    StoreLost(#[source] StoreError),

    #[error("commit failed: {0}")]
    Commit(#[source] StoreError),
}

/// Which error counter a failed row lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowErrorClass {
    Storage,
    Other,
}

#[derive(Debug, Error)]
pub enum RowError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("uplink not found after upsert")]
    UplinkNotFound,
}

impl RowError {
    /// Constraint and connectivity failures count as storage errors;
    /// anything else the store reports is an unexpected error.
    pub fn class(&self) -> RowErrorClass {
        match self {
            Self::Storage(e) if e.kind == StoreErrorKind::Other => RowErrorClass::Other,
            Self::Storage(_) => RowErrorClass::Storage,
            Self::UplinkNotFound => RowErrorClass::Other,
        }
    }
}
