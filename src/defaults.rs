//! Names and defaults shared across the worker

/// JetStream stream holding pending CSV jobs
pub const STREAM_NAME: &str = "ETL_CSV_JOBS";
pub const JOB_SUBJECT: &str = "etl.jobs.csv";
pub const CONSUMER_NAME: &str = "csv_workers";
/// Job results are published on `<RESULT_PREFIX>.<job_id>`
pub const RESULT_PREFIX: &str = "etl.job.csv.result";
pub const NOTIFY_SUBJECT: &str = "etl.notify.csv_completed";

pub const NOTIFY_TIMEOUT_SECS: u64 = 5;
pub const MAX_DELIVER: i64 = 3;
/// Redelivery delay when the same file is already being ingested
pub const IN_FLIGHT_NAK_DELAY_SECS: u64 = 30;
/// How long one pull request waits for a job before it is renewed
pub const FETCH_EXPIRES_SECS: u64 = 5;
/// Pause after a failed pull request
pub const FETCH_RETRY_DELAY_SECS: u64 = 1;

pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";
pub const DEFAULT_PROCESSED_DIR: &str = "/data/processed";
pub const DEFAULT_RUN_LOG_FILE: &str = "logs/ingest-runs.jsonl";
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;
pub const DEFAULT_ACK_WAIT_SECS: u64 = 900;
pub const DEFAULT_CSV_DELIMITER: u8 = b',';

/// Row errors beyond this count are only counted, not logged one by one
pub const MAX_LOGGED_ROW_ERRORS: u64 = 20;
