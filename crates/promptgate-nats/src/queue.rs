//! [`TaskQueue`] on a JetStream work-queue stream.

use async_nats::HeaderMap;
use async_nats::jetstream::{self, AckKind, consumer::PullConsumer};
use async_trait::async_trait;
use futures::StreamExt;
use promptgate_core::ports::{KeyValueStore, TaskQueue};
use promptgate_core::{
    Claim, Error, Job, JobId, JobPayload, JobResult, JobState, Result, WorkerId,
};
use promptgate_queue::{JobLedger, lease_deadline};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::connection::unavailable;
use crate::metrics::NatsMetrics;
use crate::store::NatsKvStore;

/// Shortest pull request the server is asked to hold open.
const MIN_PULL_WAIT: Duration = Duration::from_millis(100);

/// Work queue on a JetStream stream with a shared durable pull consumer.
///
/// Each job is one message. The consumer's `ack_wait` is the lease: an
/// unacknowledged message is redelivered once it elapses, and progress acks
/// push it out. Job records live in the KV bucket through a [`JobLedger`].
pub struct NatsTaskQueue {
    jetstream: jetstream::Context,
    consumer: PullConsumer,
    ledger: JobLedger,
    subject: String,
    metrics: Arc<NatsMetrics>,
    in_flight: Mutex<HashMap<JobId, jetstream::Message>>,
}

impl NatsTaskQueue {
    pub(crate) fn new(
        jetstream: jetstream::Context,
        consumer: PullConsumer,
        store: Arc<NatsKvStore>,
        subject: String,
        metrics: Arc<NatsMetrics>,
    ) -> Self {
        let store: Arc<dyn KeyValueStore> = store;
        Self {
            jetstream,
            consumer,
            ledger: JobLedger::new(store),
            subject,
            metrics,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    async fn publish(&self, job: &Job) -> Result<()> {
        let payload = serde_json::to_vec(job)?;

        // The job id doubles as the message id, so a retried publish inside
        // the duplicate window is dropped by the server.
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", job.id.to_string().as_str());

        let ack = self
            .jetstream
            .publish_with_headers(self.subject.clone(), headers, payload.into())
            .await
            .map_err(|e| unavailable("Failed to publish job", e))?;
        ack.await
            .map_err(|e| unavailable("Failed to confirm job publish", e))?;
        Ok(())
    }

    /// Pull at most one message, waiting up to `wait`.
    async fn next_message(&self, wait: Duration) -> Result<Option<jetstream::Message>> {
        let mut batch = self
            .consumer
            .batch()
            .max_messages(1)
            .expires(wait.max(MIN_PULL_WAIT))
            .messages()
            .await
            .map_err(|e| unavailable("Failed to pull job", e))?;

        match batch.next().await {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(e)) => Err(unavailable("Failed to receive job", e)),
            None => Ok(None),
        }
    }

    /// Acknowledge a message whose job needs no further work.
    async fn ack(&self, message: &jetstream::Message) {
        match message.ack().await {
            Ok(()) => self.metrics.record_ack(),
            Err(e) => warn!(error = %e, "Failed to ack job message"),
        }
    }

    async fn take(&self, claim: &Claim) -> Option<jetstream::Message> {
        self.in_flight.lock().await.remove(&claim.job_id())
    }
}

#[async_trait]
impl TaskQueue for NatsTaskQueue {
    async fn enqueue(&self, payload: JobPayload, trace_context: Option<String>) -> Result<JobId> {
        let job = Job::new(payload).with_trace_context(trace_context);
        let id = job.id;

        self.ledger.insert(&job).await?;

        if let Err(e) = self.publish(&job).await {
            self.metrics.record_publish_failure();
            error!(job_id = %id, error = %e, "Job recorded but not published");
            if let Err(mark) = self
                .ledger
                .finish(&job, &JobResult::failed("Job could not be queued."))
                .await
            {
                warn!(job_id = %id, error = %mark, "Failed to mark unpublished job as failed");
            }
            return Err(e);
        }

        self.metrics.record_publish();
        info!(job_id = %id, subject = %self.subject, "Job queued");
        Ok(id)
    }

    async fn job_state(&self, id: JobId) -> Result<JobState> {
        self.ledger.state(id).await
    }

    async fn claim(
        &self,
        worker_id: WorkerId,
        lease: Duration,
        wait: Duration,
    ) -> Result<Option<Claim>> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let Some(message) = self.next_message(remaining).await? else {
                return Ok(None);
            };

            let job: Job = match serde_json::from_slice(&message.payload) {
                Ok(job) => job,
                Err(e) => {
                    // Nothing can ever process it; drop it for good.
                    error!(error = %e, "Discarding unreadable job message");
                    if let Err(e) = message.ack_with(AckKind::Term).await {
                        warn!(error = %e, "Failed to terminate job message");
                    }
                    continue;
                }
            };

            let attempt = message
                .info()
                .map(|info| u32::try_from(info.delivered).unwrap_or(u32::MAX))
                .unwrap_or(1);
            self.metrics.record_delivery(attempt);

            let lease_expires_at = lease_deadline(lease);
            match self
                .ledger
                .start(&job, worker_id, attempt, lease_expires_at)
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    self.ack(&message).await;
                    if tokio::time::Instant::now() >= deadline {
                        return Ok(None);
                    }
                    continue;
                }
                Err(e) => {
                    // Hand the message straight back rather than waiting out
                    // ack_wait.
                    if let Err(nak) = message.ack_with(AckKind::Nak(None)).await {
                        warn!(job_id = %job.id, error = %nak, "Failed to nak job message");
                    }
                    return Err(e);
                }
            }

            debug!(job_id = %job.id, worker_id = %worker_id, attempt, "Job claimed");
            self.in_flight.lock().await.insert(job.id, message);

            return Ok(Some(Claim {
                job,
                worker_id,
                attempt,
                lease_expires_at,
            }));
        }
    }

    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<()> {
        let message = self
            .in_flight
            .lock()
            .await
            .get(&claim.job_id())
            .cloned()
            .ok_or_else(|| Error::Internal(format!("no delivery held for {}", claim.job_id())))?;
        message
            .ack_with(AckKind::Progress)
            .await
            .map_err(|e| unavailable("Failed to extend lease", e))?;

        self.ledger
            .renew(claim.job_id(), claim.worker_id, lease_deadline(lease))
            .await
    }

    async fn complete(&self, claim: &Claim, result: &JobResult) -> Result<()> {
        self.ledger.finish(&claim.job, result).await?;

        match self.take(claim).await {
            Some(message) => self.ack(&message).await,
            None => debug!(job_id = %claim.job_id(), "Completed job had no held delivery"),
        }
        Ok(())
    }

    async fn release(&self, claim: &Claim) -> Result<()> {
        let Some(message) = self.take(claim).await else {
            return Ok(());
        };

        message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| unavailable("Failed to release job", e))?;
        self.metrics.record_nack();
        debug!(job_id = %claim.job_id(), "Job released for redelivery");
        Ok(())
    }
}
