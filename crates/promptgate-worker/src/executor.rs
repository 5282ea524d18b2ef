//! Job execution logic.

use crate::heartbeat::LeaseHeartbeat;
use promptgate_core::ports::{ComputeService, KeyValueStore, TaskQueue};
use promptgate_core::{Claim, JobResult, Result};
use promptgate_queue::{read_result, write_result};
use promptgate_trace::{TraceContext, job_span};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, error, info, warn};

/// What happened to a claimed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The job ran and this result was stored.
    Completed(JobResult),
    /// The delivery limit was reached; the job was failed without running.
    Exhausted(JobResult),
    /// A result already existed; the delivery was acknowledged and dropped.
    Duplicate,
}

/// Runs claimed jobs against the compute service and records their results.
pub struct JobExecutor {
    queue: Arc<dyn TaskQueue>,
    store: Arc<dyn KeyValueStore>,
    compute: Arc<dyn ComputeService>,
    lease: Duration,
    heartbeat_interval: Duration,
    max_attempts: u32,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn KeyValueStore>,
        compute: Arc<dyn ComputeService>,
    ) -> Self {
        Self {
            queue,
            store,
            compute,
            lease: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(10),
            max_attempts: 3,
        }
    }

    pub fn with_lease(mut self, lease: Duration, heartbeat_interval: Duration) -> Self {
        self.lease = lease;
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Execute a claimed job and settle it with the queue.
    ///
    /// On error the claim is released, so the job will be delivered again.
    pub async fn execute(&self, claim: Claim) -> Result<JobOutcome> {
        let parent = claim
            .job
            .trace_context
            .as_deref()
            .and_then(TraceContext::from_traceparent);
        let span = job_span(
            &claim.job_id().to_string(),
            &claim.worker_id.to_string(),
            claim.attempt,
            parent.as_ref(),
        );

        let outcome = self.execute_claim(&claim).instrument(span).await;
        if let Err(e) = &outcome {
            error!(job_id = %claim.job_id(), error = %e, "Job not settled, releasing claim");
            if let Err(release) = self.queue.release(&claim).await {
                warn!(job_id = %claim.job_id(), error = %release, "Failed to release claim");
            }
        }
        outcome
    }

    async fn execute_claim(&self, claim: &Claim) -> Result<JobOutcome> {
        let job_id = claim.job_id();

        if let Some(existing) = read_result(self.store.as_ref(), job_id).await? {
            info!(job_id = %job_id, status = existing.status(), "Result already stored, dropping delivery");
            self.queue.complete(claim, &existing).await?;
            return Ok(JobOutcome::Duplicate);
        }

        if claim.attempt > self.max_attempts {
            warn!(
                job_id = %job_id,
                attempt = claim.attempt,
                max_attempts = self.max_attempts,
                "Delivery limit reached, failing job"
            );
            let result = JobResult::failed(format!(
                "Job abandoned after {} attempts.",
                self.max_attempts
            ));
            if self.settle(claim, &result).await?.is_some() {
                return Ok(JobOutcome::Duplicate);
            }
            return Ok(JobOutcome::Exhausted(result));
        }

        info!(job_id = %job_id, attempt = claim.attempt, compute = self.compute.name(), "Starting job");
        let started = tokio::time::Instant::now();

        let heartbeat = LeaseHeartbeat::start(
            self.queue.clone(),
            claim.clone(),
            self.heartbeat_interval,
            self.lease,
        );
        let result = self.run_compute(claim).await;
        if !heartbeat.stop().await {
            warn!(job_id = %job_id, "Lease lost during run, another delivery may finish first");
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            JobResult::Done { .. } => info!(job_id = %job_id, duration_ms, "Job completed"),
            JobResult::Failed { error } => warn!(job_id = %job_id, duration_ms, error = %error, "Job failed"),
        }

        if let Some(stored) = self.settle(claim, &result).await? {
            info!(job_id = %job_id, status = stored.status(), "Another delivery stored a result first, discarding this one");
            return Ok(JobOutcome::Duplicate);
        }
        Ok(JobOutcome::Completed(result))
    }

    /// Run compute on its own task so a panic stays contained.
    async fn run_compute(&self, claim: &Claim) -> JobResult {
        let compute = self.compute.clone();
        let prompt = claim.job.payload.prompt.clone();
        let task = tokio::spawn(async move { compute.compute(&prompt).await }.in_current_span());

        match task.await {
            Ok(Ok(text)) => JobResult::done(text),
            Ok(Err(e)) => JobResult::failed(e.to_string()),
            Err(join_error) => {
                error!(job_id = %claim.job_id(), error = %join_error, "Compute task aborted");
                JobResult::failed("Compute task crashed.")
            }
        }
    }

    /// Store the result, then complete the claim. The result key is written
    /// first so a poller never sees a finished job without its result.
    ///
    /// Returns the stored result when an earlier delivery already wrote one;
    /// the claim is then completed with that result instead.
    async fn settle(&self, claim: &Claim, result: &JobResult) -> Result<Option<JobResult>> {
        let stored = write_result(self.store.as_ref(), claim.job_id(), result).await?;
        self.queue
            .complete(claim, stored.as_ref().unwrap_or(result))
            .await?;
        Ok(stored)
    }
}
