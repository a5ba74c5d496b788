//! Event notifier: a bounded in-process queue drained by one background worker.
//!
//! `publish` only ever `try_send`s, so request handlers never wait on the event
//! transport. The worker hands each event to an [`EventSink`]; delivery failures are
//! logged there and go no further.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::events::{BookEvent, EventNotifier, EventPublishError};

use super::error::InfraError;

const KAFKA_JSON_CONTENT_TYPE: &str = "application/vnd.kafka.json.v2+json";

/// Final destination of published events.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn deliver(&self, event: &BookEvent) -> Result<(), EventPublishError>;
}

#[derive(Serialize)]
struct ProduceRequest<'a> {
    records: [ProduceRecord<'a>; 1],
}

#[derive(Serialize)]
struct ProduceRecord<'a> {
    key: &'a str,
    value: serde_json::Value,
}

/// Produces to a Kafka topic through a Confluent-compatible REST proxy.
pub struct RestProxySink {
    client: Client,
    endpoint: String,
    topic: String,
}

impl RestProxySink {
    pub fn new(
        base_url: &str,
        topic: impl Into<String>,
        write_timeout: Duration,
    ) -> Result<Self, InfraError> {
        let topic = topic.into();
        let client = Client::builder()
            .user_agent(concat!("bookshelf/", env!("CARGO_PKG_VERSION")))
            .timeout(write_timeout)
            .build()
            .map_err(|err| InfraError::events(format!("failed to build http client: {err}")))?;
        let endpoint = format!("{}/topics/{}", base_url.trim_end_matches('/'), topic);
        Ok(Self {
            client,
            endpoint,
            topic,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSink for RestProxySink {
    fn name(&self) -> &'static str {
        "rest_proxy"
    }

    async fn deliver(&self, event: &BookEvent) -> Result<(), EventPublishError> {
        let body = ProduceRequest {
            records: [ProduceRecord {
                key: event.key(),
                value: event.payload()?,
            }],
        };
        let payload = serde_json::to_vec(&body)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, KAFKA_JSON_CONTENT_TYPE)
            .body(payload)
            .send()
            .await
            .map_err(EventPublishError::delivery)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EventPublishError::delivery(format!(
                "topic {} returned status {status}: {text}",
                self.topic
            )));
        }
        Ok(())
    }
}

/// Writes events to the log instead of a broker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn deliver(&self, event: &BookEvent) -> Result<(), EventPublishError> {
        let payload = event.payload()?;
        info!(event_kind = event.kind(), key = event.key(), %payload, "event emitted");
        Ok(())
    }
}

/// Fire-and-forget notifier with an explicit open/close lifecycle.
pub struct ChannelNotifier {
    sender: Mutex<Option<mpsc::Sender<BookEvent>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelNotifier {
    /// Spawn the delivery worker. Must be called inside a Tokio runtime.
    pub fn open(sink: Arc<dyn EventSink>, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(sink, receiver));
        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stop accepting events and drain what is queued, for at most `grace`.
    ///
    /// Events still queued when `grace` elapses are lost. Closing twice is a no-op.
    pub async fn close(&self, grace: Duration) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut worker) = worker else {
            return;
        };

        match tokio::time::timeout(grace, &mut worker).await {
            Ok(_) => info!("event notifier drained"),
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "event notifier did not drain in time; aborting"
                );
                worker.abort();
            }
        }
    }
}

impl EventNotifier for ChannelNotifier {
    fn publish(&self, event: BookEvent) -> Result<(), EventPublishError> {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            counter!("bookshelf_events_dropped_total").increment(1);
            return Err(EventPublishError::Closed);
        };

        match sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                counter!("bookshelf_events_dropped_total").increment(1);
                warn!(
                    event_kind = event.kind(),
                    key = event.key(),
                    "event queue full; dropping event"
                );
                Err(EventPublishError::QueueFull)
            }
            Err(TrySendError::Closed(event)) => {
                counter!("bookshelf_events_dropped_total").increment(1);
                warn!(
                    event_kind = event.kind(),
                    key = event.key(),
                    "event worker stopped; dropping event"
                );
                Err(EventPublishError::Closed)
            }
        }
    }
}

async fn run_worker(sink: Arc<dyn EventSink>, mut receiver: mpsc::Receiver<BookEvent>) {
    debug!(sink = sink.name(), "event worker started");
    while let Some(event) = receiver.recv().await {
        match sink.deliver(&event).await {
            Ok(()) => {
                counter!("bookshelf_events_published_total").increment(1);
                debug!(
                    sink = sink.name(),
                    event_kind = event.kind(),
                    key = event.key(),
                    "event delivered"
                );
            }
            Err(err) => {
                counter!("bookshelf_events_dropped_total").increment(1);
                warn!(
                    sink = sink.name(),
                    event_kind = event.kind(),
                    key = event.key(),
                    error = %err,
                    "event delivery failed"
                );
            }
        }
    }
    debug!(sink = sink.name(), "event worker stopped");
}
