//! Ingestion services

pub mod decoder;
pub mod finalizer;
pub mod identity;
pub mod in_flight;
pub mod ingest_processor;
pub mod notifier;
pub mod outcome;
pub mod parsers;
pub mod pipeline;
pub mod run_log;
pub mod upsert;
