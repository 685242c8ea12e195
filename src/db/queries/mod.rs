//! Database queries

pub mod device;
pub mod ingest_run;
pub mod measurement;
pub mod uplink;
