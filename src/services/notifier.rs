//! Completion notifications for dashboards
//!
//! Configuration via NOTIFY_URL:
//! - set → HttpNotifier (POST the event to the API, which fans it out)
//! - unset → NatsNotifier when the worker has a NATS connection, else LogNotifier

use std::time::Duration;

use anyhow::Result;
use async_nats::Client;
use async_trait::async_trait;
use tracing::info;

use crate::defaults::{NOTIFY_SUBJECT, NOTIFY_TIMEOUT_SECS};
use crate::types::CompletionEvent;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &CompletionEvent) -> Result<()>;

    /// Name of this notifier for logging
    fn name(&self) -> &'static str;
}

/// Publishes events on a NATS subject for real-time subscribers
pub struct NatsNotifier {
    client: Client,
    subject: String,
}

impl NatsNotifier {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            subject: NOTIFY_SUBJECT.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify(&self, event: &CompletionEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(self.subject.clone(), payload.into()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "nats"
    }
}

/// POSTs events to an HTTP endpoint
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, event: &CompletionEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Writes the event to the log only
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &CompletionEvent) -> Result<()> {
        info!("{}", event.text);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Pick the notifier for this process
pub fn create_notifier(notify_url: Option<&str>, nats: Option<Client>) -> Result<Box<dyn Notifier>> {
    if let Some(url) = notify_url {
        return Ok(Box::new(HttpNotifier::new(url)?));
    }
    Ok(match nats {
        Some(client) => Box::new(NatsNotifier::new(client)),
        None => Box::new(LogNotifier),
    })
}
