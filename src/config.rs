//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::defaults::{
    DEFAULT_ACK_WAIT_SECS, DEFAULT_CSV_DELIMITER, DEFAULT_MAX_CONCURRENT_JOBS, DEFAULT_NATS_URL,
    DEFAULT_PROCESSED_DIR, DEFAULT_RUN_LOG_FILE,
};

/// Where finished runs are recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunLogBackend {
    /// `ingest_runs` table
    Postgres,
    /// JSON-lines file at the given path
    File(PathBuf),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials (both must be set)
    pub nats_credentials: Option<(String, String)>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Committed files are moved here
    pub processed_dir: PathBuf,

    /// HTTP endpoint for completion events (falls back to NATS when unset)
    pub notify_url: Option<String>,

    pub run_log: RunLogBackend,

    pub max_concurrent_jobs: usize,

    /// How long JetStream waits for an ack before redelivering a job
    pub job_ack_wait: Duration,

    pub csv_delimiter: u8,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL").unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());

        let nats_credentials = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
            (Ok(user), Ok(password)) if !user.is_empty() => Some((user, password)),
            _ => None,
        };

        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let processed_dir = std::env::var("PROCESSED_DIR")
            .unwrap_or_else(|_| DEFAULT_PROCESSED_DIR.to_string())
            .into();

        let notify_url = std::env::var("NOTIFY_URL").ok().filter(|u| !u.trim().is_empty());

        let run_log_file = std::env::var("RUN_LOG_FILE")
            .unwrap_or_else(|_| DEFAULT_RUN_LOG_FILE.to_string());
        let run_log = parse_run_log_backend(
            &std::env::var("RUN_LOG_BACKEND").unwrap_or_else(|_| "postgres".to_string()),
            run_log_file,
        )?;

        let max_concurrent_jobs = match std::env::var("MAX_CONCURRENT_JOBS") {
            Ok(v) => v
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("MAX_CONCURRENT_JOBS must be a positive integer, got '{}'", v))?,
            Err(_) => DEFAULT_MAX_CONCURRENT_JOBS,
        };

        let ack_wait_secs = match std::env::var("JOB_ACK_WAIT_SECS") {
            Ok(v) => v
                .parse::<u64>()
                .with_context(|| format!("JOB_ACK_WAIT_SECS must be a number of seconds, got '{}'", v))?,
            Err(_) => DEFAULT_ACK_WAIT_SECS,
        };

        let csv_delimiter = match std::env::var("CSV_DELIMITER") {
            Ok(v) => parse_delimiter(&v)?,
            Err(_) => DEFAULT_CSV_DELIMITER,
        };

        Ok(Self {
            nats_url,
            nats_credentials,
            database_url,
            processed_dir,
            notify_url,
            run_log,
            max_concurrent_jobs,
            job_ack_wait: Duration::from_secs(ack_wait_secs),
            csv_delimiter,
        })
    }
}

fn parse_run_log_backend(value: &str, file: String) -> Result<RunLogBackend> {
    match value.trim().to_lowercase().as_str() {
        "postgres" | "db" => Ok(RunLogBackend::Postgres),
        "file" => Ok(RunLogBackend::File(file.into())),
        other => anyhow::bail!("RUN_LOG_BACKEND must be 'postgres' or 'file', got '{}'", other),
    }
}

/// The delimiter must be a single ASCII character; `\t` and `tab` mean tab.
fn parse_delimiter(value: &str) -> Result<u8> {
    match value {
        "\\t" | "tab" | "\t" => return Ok(b'\t'),
        _ => {}
    }
    match value.as_bytes() {
        [b] if b.is_ascii() && *b != b'"' && *b != b'\n' => Ok(*b),
        _ => anyhow::bail!("CSV_DELIMITER must be a single ASCII character, got '{}'", value),
    }
}
