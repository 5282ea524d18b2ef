//! Persistent job records.

use crate::keys::{job_record_key, job_result_key};
use chrono::{DateTime, Utc};
use promptgate_core::ports::KeyValueStore;
use promptgate_core::{Job, JobId, JobRecord, JobResult, JobState, Result, WorkerId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wall-clock expiry of a lease taken now.
pub fn lease_deadline(lease: Duration) -> DateTime<Utc> {
    let lease = chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::days(1));
    Utc::now() + lease
}

/// Write the terminal result of a job unless one is already stored.
///
/// The first result written is final. When an earlier write won, that
/// result is returned and `result` is discarded.
pub async fn write_result(
    store: &dyn KeyValueStore,
    id: JobId,
    result: &JobResult,
) -> Result<Option<JobResult>> {
    let encoded = serde_json::to_vec(result)?;
    if store.set_if_absent(&job_result_key(id), &encoded).await? {
        return Ok(None);
    }

    debug!(job_id = %id, "Result already stored, keeping it");
    Ok(Some(
        read_result(store, id).await?.unwrap_or_else(|| result.clone()),
    ))
}

/// Read the terminal result of a job, if one was written.
pub async fn read_result(store: &dyn KeyValueStore, id: JobId) -> Result<Option<JobResult>> {
    match store.get(&job_result_key(id)).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Job records kept in the shared store under `job.<id>`.
///
/// Records are rewritten whole on every transition. Only the holder of a
/// job's lease writes its record, so last-write-wins is enough.
#[derive(Clone)]
pub struct JobLedger {
    store: Arc<dyn KeyValueStore>,
}

impl JobLedger {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub async fn load(&self, id: JobId) -> Result<Option<JobRecord>> {
        match self.store.get(&job_record_key(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn save(&self, record: &JobRecord) -> Result<()> {
        let encoded = serde_json::to_vec(record)?;
        self.store.set(&job_record_key(record.job.id), &encoded).await
    }

    /// Record a newly submitted job as `Queued`.
    pub async fn insert(&self, job: &Job) -> Result<JobRecord> {
        let record = JobRecord::queued(job.clone());
        self.save(&record).await?;
        debug!(job_id = %job.id, "Job recorded");
        Ok(record)
    }

    /// Current state, `Unknown` when no record exists.
    pub async fn state(&self, id: JobId) -> Result<JobState> {
        Ok(self
            .load(id)
            .await?
            .map(|r| r.state)
            .unwrap_or(JobState::Unknown))
    }

    /// Move a delivered job to `Processing`.
    ///
    /// Returns `None` when the job already reached a terminal state, in which
    /// case the delivery is stale and must be dropped.
    pub async fn start(
        &self,
        job: &Job,
        worker_id: WorkerId,
        attempt: u32,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<Option<JobRecord>> {
        let mut record = match self.load(job.id).await? {
            Some(record) => record,
            None => {
                warn!(job_id = %job.id, "Delivered job has no record, recreating it");
                JobRecord::queued(job.clone())
            }
        };

        if record.state.is_terminal() {
            debug!(job_id = %job.id, state = record.state.name(), "Skipping delivery of finished job");
            return Ok(None);
        }

        record.start(worker_id, attempt, lease_expires_at)?;
        self.save(&record).await?;
        Ok(Some(record))
    }

    /// Extend the recorded lease of `worker_id`.
    pub async fn renew(
        &self,
        id: JobId,
        worker_id: WorkerId,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let Some(mut record) = self.load(id).await? else {
            return Err(promptgate_core::Error::JobNotFound(id.to_string()));
        };
        record.renew(worker_id, lease_expires_at)?;
        self.save(&record).await
    }

    /// Record the terminal outcome. A job that is already terminal keeps its
    /// first outcome.
    pub async fn finish(&self, job: &Job, result: &JobResult) -> Result<()> {
        let mut record = self
            .load(job.id)
            .await?
            .unwrap_or_else(|| JobRecord::queued(job.clone()));

        if record.state.is_terminal() {
            debug!(job_id = %job.id, state = record.state.name(), "Job already finished");
            return Ok(());
        }

        record.finish(result)?;
        self.save(&record).await
    }
}
