//! NATS JetStream job queue.
//!
//! Jobs are published onto a work-queue stream; duplicate suppression
//! rides on the `Nats-Msg-Id` header inside the stream's duplicate window,
//! so replayed enqueues of the same idempotency key are no-ops at the
//! broker. Requeues re-publish after the delay without a dedupe header.

use crate::error::QueueError;
use crate::queue::{EnqueueOutcome, JobQueue};
use amber_relay_scheduler::Job;
use async_nats::jetstream;
use async_nats::jetstream::consumer::pull;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

/// Stream name for jobs.
const JOB_STREAM_NAME: &str = "RELAY_JOBS";

/// Subject jobs are published to.
const JOBS_SUBJECT: &str = "relay.jobs";

/// Durable consumer shared by the worker pool.
const WORKERS_CONSUMER: &str = "relay-workers";

/// Configuration for the NATS-backed job queue.
#[derive(Debug, Clone)]
pub struct NatsQueueConfig {
    /// NATS server URL.
    pub url: String,
    /// Stream name (defaults to RELAY_JOBS).
    pub stream_name: Option<String>,
    /// Duplicate-detection window (defaults to 10 minutes).
    pub duplicate_window: Option<Duration>,
}

impl NatsQueueConfig {
    /// Creates a config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stream_name: None,
            duplicate_window: None,
        }
    }

    fn stream(&self) -> &str {
        self.stream_name.as_deref().unwrap_or(JOB_STREAM_NAME)
    }

    fn window(&self) -> Duration {
        self.duplicate_window
            .unwrap_or_else(|| Duration::from_secs(600))
    }
}

/// A JetStream-backed job queue.
pub struct NatsJobQueue {
    jetstream: jetstream::Context,
    consumer: jetstream::consumer::Consumer<pull::Config>,
}

impl NatsJobQueue {
    /// Connects and ensures the stream and worker consumer exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or stream setup fails.
    pub async fn connect(config: NatsQueueConfig) -> Result<Self, QueueError> {
        let client =
            async_nats::connect(&config.url)
                .await
                .map_err(|e| QueueError::EnqueueFailed {
                    message: format!("failed to connect to NATS: {e}"),
                })?;
        let jetstream = async_nats::jetstream::new(client);

        let stream_config = jetstream::stream::Config {
            name: config.stream().to_string(),
            subjects: vec![JOBS_SUBJECT.to_string()],
            storage: jetstream::stream::StorageType::File,
            retention: jetstream::stream::RetentionPolicy::WorkQueue,
            duplicate_window: config.window(),
            ..Default::default()
        };
        let stream = jetstream
            .get_or_create_stream(stream_config)
            .await
            .map_err(|e| QueueError::EnqueueFailed {
                message: format!("failed to create job stream: {e}"),
            })?;

        let consumer = stream
            .get_or_create_consumer(
                WORKERS_CONSUMER,
                pull::Config {
                    durable_name: Some(WORKERS_CONSUMER.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::DequeueFailed {
                message: format!("failed to create worker consumer: {e}"),
            })?;

        Ok(Self {
            jetstream,
            consumer,
        })
    }

    async fn publish(&self, job: &Job, dedupe: bool) -> Result<bool, QueueError> {
        let bytes = serde_json::to_vec(job).map_err(|e| QueueError::EnqueueFailed {
            message: format!("failed to serialize job: {e}"),
        })?;

        let publish = if dedupe {
            let mut headers = async_nats::HeaderMap::new();
            headers.insert("Nats-Msg-Id", job.idempotency_key.as_str());
            self.jetstream
                .publish_with_headers(JOBS_SUBJECT, headers, bytes.into())
                .await
        } else {
            self.jetstream.publish(JOBS_SUBJECT, bytes.into()).await
        };

        let ack = publish
            .map_err(|e| QueueError::EnqueueFailed {
                message: e.to_string(),
            })?
            .await
            .map_err(|e| QueueError::EnqueueFailed {
                message: e.to_string(),
            })?;

        Ok(ack.duplicate)
    }
}

#[async_trait]
impl JobQueue for NatsJobQueue {
    async fn enqueue(&self, job: Job) -> Result<EnqueueOutcome, QueueError> {
        let duplicate = self.publish(&job, true).await?;
        if duplicate {
            tracing::debug!(key = %job.idempotency_key, "broker dropped duplicate job");
            Ok(EnqueueOutcome::Duplicate)
        } else {
            Ok(EnqueueOutcome::Accepted)
        }
    }

    async fn dequeue(&self) -> Result<Option<Job>, QueueError> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(1)
            .messages()
            .await
            .map_err(|e| QueueError::DequeueFailed {
                message: e.to_string(),
            })?;

        let Some(message) = batch.next().await else {
            return Ok(None);
        };
        let message = message.map_err(|e| QueueError::DequeueFailed {
            message: e.to_string(),
        })?;

        let job: Job =
            serde_json::from_slice(&message.payload).map_err(|e| QueueError::DequeueFailed {
                message: format!("failed to deserialize job: {e}"),
            })?;

        message.ack().await.map_err(|e| QueueError::DequeueFailed {
            message: format!("failed to ack job: {e}"),
        })?;

        Ok(Some(job))
    }

    async fn requeue(&self, job: Job, delay: Duration) -> Result<(), QueueError> {
        // JetStream has no native delayed delivery; sleep out of band and
        // re-publish without the dedupe header (it is the same job).
        let jetstream = self.jetstream.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let bytes = match serde_json::to_vec(&job) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to serialize requeued job");
                    return;
                }
            };
            match jetstream.publish(JOBS_SUBJECT, bytes.into()).await {
                Ok(ack) => {
                    if let Err(e) = ack.await {
                        tracing::error!(error = %e, "requeue publish not acknowledged");
                    }
                }
                Err(e) => tracing::error!(error = %e, "failed to requeue job"),
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = NatsQueueConfig::new("nats://localhost:4222");
        assert_eq!(config.stream(), JOB_STREAM_NAME);
        assert_eq!(config.window(), Duration::from_secs(600));
    }

    #[test]
    fn config_overrides() {
        let config = NatsQueueConfig {
            url: "nats://localhost:4222".to_string(),
            stream_name: Some("CUSTOM_JOBS".to_string()),
            duplicate_window: Some(Duration::from_secs(60)),
        };
        assert_eq!(config.stream(), "CUSTOM_JOBS");
        assert_eq!(config.window(), Duration::from_secs(60));
    }
}
