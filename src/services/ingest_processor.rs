//! CSV ingestion JetStream processor
//!
//! Pulls CSV jobs from a work-queue stream and runs each through the
//! ingestion pipeline:
//! - Bounded concurrency (one permit per running file, one job pulled per permit)
//! - Redelivery by JetStream when a worker dies mid-job (max 3 deliveries)
//! - Results published per job for whoever submitted it
//!
//! ## Streams
//! - `ETL_CSV_JOBS` - subject `etl.jobs.csv`, one message per file

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_nats::jetstream::consumer::PullConsumer;
use async_nats::jetstream::{self, AckKind, Context as JsContext};
use async_nats::Client;
use futures::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::in_flight::InFlightRegistry;
use super::pipeline::IngestPipeline;
use crate::defaults::{
    CONSUMER_NAME, FETCH_EXPIRES_SECS, FETCH_RETRY_DELAY_SECS, IN_FLIGHT_NAK_DELAY_SECS,
    JOB_SUBJECT, MAX_DELIVER, RESULT_PREFIX, STREAM_NAME,
};
use crate::types::{CsvJob, CsvJobResult};

/// Create the job stream if it does not exist yet
pub async fn ensure_stream(js: &JsContext) -> Result<()> {
    let stream_config = jetstream::stream::Config {
        name: STREAM_NAME.to_string(),
        subjects: vec![JOB_SUBJECT.to_string()],
        max_messages: 10_000,
        retention: jetstream::stream::RetentionPolicy::WorkQueue,
        ..Default::default()
    };
    js.get_or_create_stream(stream_config).await?;
    info!("JetStream stream '{}' ready", STREAM_NAME);
    Ok(())
}

/// Queue `file_path` for ingestion
pub async fn submit_job(js: &JsContext, file_path: &Path) -> Result<CsvJob> {
    let job = CsvJob::new(file_path);
    let payload = serde_json::to_vec(&job)?;
    js.publish(JOB_SUBJECT, payload.into()).await?.await?;
    info!("CSV job {} submitted for {}", job.id, job.file_path.display());
    Ok(job)
}

/// Jobs requested per pull. A job is only pulled once a permit is held, so
/// its ack wait starts when it can actually run.
const JOBS_PER_FETCH: usize = 1;

fn result_subject(job_id: Uuid) -> String {
    format!("{}.{}", RESULT_PREFIX, job_id)
}

/// Pull at most one job. `None` when the request expired without one.
async fn fetch_job(consumer: &PullConsumer) -> Result<Option<jetstream::Message>> {
    let mut batch = consumer
        .fetch()
        .max_messages(JOBS_PER_FETCH)
        .expires(Duration::from_secs(FETCH_EXPIRES_SECS))
        .messages()
        .await?;
    match batch.next().await {
        Some(Ok(msg)) => Ok(Some(msg)),
        Some(Err(e)) => Err(anyhow::anyhow!(e)),
        None => Ok(None),
    }
}

pub struct IngestProcessor {
    client: Client,
    js: JsContext,
    pipeline: Arc<IngestPipeline>,
    in_flight: InFlightRegistry,
    max_concurrent_jobs: usize,
    ack_wait: Duration,
}

impl IngestProcessor {
    /// Create the processor, initializing the JetStream stream
    pub async fn new(
        client: Client,
        pipeline: Arc<IngestPipeline>,
        max_concurrent_jobs: usize,
        ack_wait: Duration,
    ) -> Result<Self> {
        let js = jetstream::new(client.clone());
        ensure_stream(&js).await?;

        Ok(Self {
            client,
            js,
            pipeline,
            in_flight: InFlightRegistry::new(),
            max_concurrent_jobs: max_concurrent_jobs.max(1),
            ack_wait,
        })
    }

    /// Consume jobs until `shutdown` fires, then wait for running jobs.
    pub async fn start_processing(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        let stream = self.js.get_stream(STREAM_NAME).await?;

        let consumer_config = jetstream::consumer::pull::Config {
            durable_name: Some(CONSUMER_NAME.to_string()),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ack_wait: self.ack_wait,
            max_deliver: MAX_DELIVER,
            filter_subject: JOB_SUBJECT.to_string(),
            ..Default::default()
        };

        let consumer = stream.get_or_create_consumer(CONSUMER_NAME, consumer_config).await?;
        info!(
            "JetStream consumer '{}' ready ({} concurrent jobs)",
            CONSUMER_NAME, self.max_concurrent_jobs
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrent_jobs));

        loop {
            let permit = tokio::select! {
                _ = shutdown.cancelled() => break,
                permit = Arc::clone(&permits).acquire_owned() => permit?,
            };

            let fetched = tokio::select! {
                _ = shutdown.cancelled() => break,
                fetched = fetch_job(&consumer) => fetched,
            };

            match fetched {
                Ok(Some(msg)) => {
                    let processor = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = processor.process_job(msg).await {
                            error!("Failed to process CSV job: {}", e);
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Error receiving CSV job message: {}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(FETCH_RETRY_DELAY_SECS)) => {}
                    }
                }
            }
        }

        info!("Waiting for running CSV jobs to finish...");
        let all = u32::try_from(self.max_concurrent_jobs).unwrap_or(u32::MAX);
        let _drained = permits.acquire_many(all).await?;
        info!("CSV job processing stopped");
        Ok(())
    }

    /// Process a single CSV job
    async fn process_job(&self, msg: jetstream::Message) -> Result<()> {
        let job: CsvJob = match serde_json::from_slice(&msg.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!("Discarding undecodable CSV job payload: {}", e);
                if let Err(e) = msg.ack_with(AckKind::Term).await {
                    error!("Failed to terminate CSV job message: {:?}", e);
                }
                return Ok(());
            }
        };

        let Some(_guard) = self.in_flight.try_acquire(&job.file_path) else {
            info!(
                "CSV job {}: '{}' is already being ingested, redelivering later",
                job.id,
                job.file_path.display()
            );
            let delay = Duration::from_secs(IN_FLIGHT_NAK_DELAY_SECS);
            if let Err(e) = msg.ack_with(AckKind::Nak(Some(delay))).await {
                error!("Failed to nak CSV job {}: {:?}", job.id, e);
            }
            return Ok(());
        };

        info!("Processing CSV job {} ({})", job.id, job.file_path.display());
        let (summary, finalization) = self.pipeline.run_job(&job.file_path).await;
        let ok = summary.ok;
        if !finalization.logged {
            warn!("CSV job {} finished without an audit record", job.id);
        }

        let result = CsvJobResult::new(&job, summary, finalization);
        let payload = serde_json::to_vec(&result)?;
        if let Err(e) = self.client.publish(result_subject(job.id), payload.into()).await {
            warn!("Failed to publish result of CSV job {}: {}", job.id, e);
        }

        // Ack failed runs too; a redelivery would fail the same way.
        if let Err(e) = msg.ack().await {
            error!("Failed to ack CSV job {}: {:?}", job.id, e);
        }

        if ok {
            info!("CSV job {} completed", job.id);
        } else {
            warn!("CSV job {} completed with failure", job.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(STREAM_NAME, "ETL_CSV_JOBS");
        assert!(JOB_SUBJECT.starts_with("etl.jobs"));
        assert_eq!(MAX_DELIVER, 3);
    }

    #[test]
    fn test_pull_requests_one_job_per_permit() {
        assert_eq!(JOBS_PER_FETCH, 1);
        // A pull that finds nothing must be renewed well before a job could time out.
        assert!(FETCH_EXPIRES_SECS < crate::defaults::DEFAULT_ACK_WAIT_SECS);
    }

    #[test]
    fn test_result_subject_is_per_job() {
        let job_id = Uuid::new_v4();
        let subject = result_subject(job_id);
        assert!(subject.starts_with("etl.job.csv.result."));
        assert!(subject.ends_with(&job_id.to_string()));
    }

    #[test]
    fn test_submitted_payload_decodes_as_job() {
        let job = CsvJob::new("/data/inbound/a.csv");
        let payload = serde_json::to_vec(&job).unwrap();
        let decoded: CsvJob = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.file_path, job.file_path);
    }
}
