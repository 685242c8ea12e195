//! Sonometer ETL Worker - ingests LoRaWAN uplink CSV exports
//!
//! This worker consumes CSV jobs from NATS JetStream and upserts devices,
//! uplinks and sound measurements into PostgreSQL.

mod cli;
mod config;
mod db;
mod defaults;
mod error;
mod services;
#[cfg(test)]
mod test_support;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::{Config, RunLogBackend};
use db::postgres::PgIngestStore;
use services::finalizer::JobFinalizer;
use services::ingest_processor::{self, IngestProcessor};
use services::notifier::create_notifier;
use services::pipeline::IngestPipeline;
use services::run_log::{JsonlRunLog, PgRunLog, RunLog};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sonometer_etl_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)) // console
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let pool = db::create_pool(&config.database_url, 1).await?;
            db::run_migrations(&pool).await
        }
        Command::Ingest { path } => {
            let pool = db::create_pool(&config.database_url, 1).await?;
            let pipeline = build_pipeline(&config, pool, None)?;
            let summary = pipeline.run(&path).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if !summary.ok {
                anyhow::bail!(
                    "ingestion of {} failed: {}",
                    path.display(),
                    summary.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }
        Command::Submit { path } => {
            let client = connect_nats(&config).await?;
            let js = async_nats::jetstream::new(client);
            ingest_processor::ensure_stream(&js).await?;
            let job = ingest_processor::submit_job(&js, &path).await?;
            println!("{}", job.id);
            Ok(())
        }
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Sonometer ETL Worker...");

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.max_concurrent_jobs).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    let nats_client = connect_nats(&config).await?;
    info!("Connected to NATS at {}", config.nats_url);

    let pipeline = build_pipeline(&config, pool, Some(nats_client.clone()))?;
    let processor = Arc::new(
        IngestProcessor::new(
            nats_client,
            pipeline,
            config.max_concurrent_jobs,
            config.job_ack_wait,
        )
        .await?,
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    if let Err(e) = processor.start_processing(shutdown).await {
        error!("Processor error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
async fn connect_nats(config: &Config) -> Result<async_nats::Client> {
    let client = match &config.nats_credentials {
        Some((user, password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        None => async_nats::connect(&config.nats_url).await?,
    };
    Ok(client)
}

fn build_pipeline(
    config: &Config,
    pool: sqlx::PgPool,
    nats: Option<async_nats::Client>,
) -> Result<Arc<IngestPipeline>> {
    let run_log: Arc<dyn RunLog> = match &config.run_log {
        RunLogBackend::Postgres => Arc::new(PgRunLog::new(pool.clone())),
        RunLogBackend::File(path) => Arc::new(JsonlRunLog::new(path)),
    };
    let notifier = create_notifier(config.notify_url.as_deref(), nats)?;
    info!(
        "Run log: {}, notifier: {}, processed dir: {}",
        run_log.name(),
        notifier.name(),
        config.processed_dir.display()
    );

    let finalizer = JobFinalizer::new(run_log, Arc::from(notifier), &config.processed_dir);
    let store = Arc::new(PgIngestStore::new(pool));

    Ok(Arc::new(IngestPipeline::new(
        store,
        Arc::new(finalizer),
        config.csv_delimiter,
    )))
}
