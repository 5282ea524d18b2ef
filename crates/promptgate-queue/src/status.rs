//! Job status resolution for pollers.

use crate::ledger::read_result;
use promptgate_core::ports::{KeyValueStore, TaskQueue};
use promptgate_core::{JobId, JobResult, JobState, Result};

/// What a poller learns about a job id.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    /// The job finished; this is its outcome.
    Finished(JobResult),
    /// The job is known and has not finished yet.
    Pending(JobState),
    /// Nothing is known about the id.
    NotFound,
}

/// Resolve the status of `raw_id`.
///
/// A stored result wins over everything else. Without one, the queue's
/// view decides between pending, a terminal state whose result was never
/// written, and an id nobody submitted. Ids that do not parse are unknown.
pub async fn poll_job(
    store: &dyn KeyValueStore,
    queue: &dyn TaskQueue,
    raw_id: &str,
) -> Result<JobStatus> {
    let Ok(id) = raw_id.parse::<JobId>() else {
        return Ok(JobStatus::NotFound);
    };

    if let Some(result) = read_result(store, id).await? {
        return Ok(JobStatus::Finished(result));
    }

    let state = queue.job_state(id).await?;
    if state.is_pending() {
        return Ok(JobStatus::Pending(state));
    }
    Ok(match state.outcome() {
        Some(result) => JobStatus::Finished(result),
        None => JobStatus::NotFound,
    })
}
