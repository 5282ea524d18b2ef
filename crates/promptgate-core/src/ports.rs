//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the gateway/worker logic and
//! external adapters. Every component receives its ports as injected
//! `Arc<dyn …>` handles; nothing reaches for process-wide state.

use crate::health::BackendReport;
use crate::ids::{JobId, WorkerId};
use crate::job::{Claim, JobPayload, JobResult, JobState};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Networked, TTL-capable key/value store shared by every gateway instance
/// and worker.
///
/// Cache entries and job data share one namespace through disjoint key
/// prefixes. Writes are per-key atomic and last-write-wins, except
/// [`KeyValueStore::set_if_absent`], which never replaces a value. Connectivity
/// failures are reported as [`crate::Error::StoreUnavailable`], never as an
/// absent key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key. Entries past their TTL are never returned.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a key without expiry.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Write a key that the store evicts `ttl` after this call.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Write a key without expiry only if it holds no live value.
    ///
    /// Returns `false`, leaving the stored value untouched, when the key is
    /// already set.
    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool>;

    /// Check that the backend answers.
    async fn ping(&self) -> Result<()>;
}

/// Durable, at-least-once work queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Record the job and make it visible to workers. Returns without waiting
    /// for execution.
    async fn enqueue(&self, payload: JobPayload, trace_context: Option<String>) -> Result<JobId>;

    /// Whether the queue knows the id.
    async fn job_exists(&self, id: JobId) -> Result<bool> {
        Ok(!matches!(self.job_state(id).await?, JobState::Unknown))
    }

    /// Current state; [`JobState::Unknown`] for ids that were never submitted.
    async fn job_state(&self, id: JobId) -> Result<JobState>;

    /// Claim the next available job under a lease of `lease`, waiting up to
    /// `wait` for one to appear.
    async fn claim(&self, worker_id: WorkerId, lease: Duration, wait: Duration)
    -> Result<Option<Claim>>;

    /// Extend the lease on a claimed job.
    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<()>;

    /// Record the terminal outcome and remove the job from dispatch.
    async fn complete(&self, claim: &Claim, result: &JobResult) -> Result<()>;

    /// Give a claimed job back for redelivery.
    async fn release(&self, claim: &Claim) -> Result<()>;
}

/// The external generation service: `compute(prompt) -> text`.
#[async_trait]
pub trait ComputeService: Send + Sync {
    async fn compute(&self, prompt: &str) -> Result<String>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// Connection state and counters of the backend behind the store and queue.
pub trait BackendHealth: Send + Sync {
    fn report(&self) -> BackendReport;
}
