//! In-process task queue.

use crate::ledger::{JobLedger, lease_deadline};
use async_trait::async_trait;
use promptgate_core::ports::{KeyValueStore, TaskQueue};
use promptgate_core::{Claim, Error, Job, JobId, JobPayload, JobResult, JobState, Result, WorkerId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A job handed out and not yet completed.
struct InFlight {
    job: Job,
    worker_id: WorkerId,
    lease_until: Instant,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    in_flight: HashMap<JobId, InFlight>,
    deliveries: HashMap<JobId, u32>,
}

impl QueueState {
    /// Put jobs whose lease ran out back at the head of the queue.
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<JobId> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.lease_until <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(flight) = self.in_flight.remove(&id) {
                warn!(job_id = %id, worker_id = %flight.worker_id, "Lease expired, requeueing job");
                self.pending.push_front(flight.job);
            }
        }
    }

    fn next_lease_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.lease_until).min()
    }
}

/// FIFO queue with leases, held in process memory.
///
/// Job records go through a [`JobLedger`] on the given store, so status
/// polling works the same as with a networked queue. Queued jobs themselves
/// do not survive a restart. Lease deadlines use the tokio clock.
pub struct MemoryTaskQueue {
    ledger: JobLedger,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryTaskQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            ledger: JobLedger::new(store),
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    /// Jobs waiting for a worker.
    pub async fn len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Jobs currently leased to a worker.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Pop the next job and lease it to `worker_id`.
    async fn take_next(&self, worker_id: WorkerId, lease: Duration) -> Option<(Job, u32)> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.requeue_expired(now);

        let job = state.pending.pop_front()?;
        let attempt = {
            let count = state.deliveries.entry(job.id).or_insert(0);
            *count += 1;
            *count
        };
        state.in_flight.insert(
            job.id,
            InFlight {
                job: job.clone(),
                worker_id,
                lease_until: now + lease,
            },
        );
        Some((job, attempt))
    }

    /// Remove a job from dispatch if `worker_id` still holds it.
    async fn settle(&self, id: JobId, worker_id: WorkerId) -> Option<InFlight> {
        let mut state = self.state.lock().await;
        match state.in_flight.get(&id) {
            Some(flight) if flight.worker_id == worker_id => {
                state.deliveries.remove(&id);
                state.in_flight.remove(&id)
            }
            _ => None,
        }
    }

    async fn wake_at(&self, deadline: Instant) -> Instant {
        let next_expiry = self.state.lock().await.next_lease_expiry();
        match next_expiry {
            Some(expiry) if expiry < deadline => expiry,
            _ => deadline,
        }
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue(&self, payload: JobPayload, trace_context: Option<String>) -> Result<JobId> {
        let job = Job::new(payload).with_trace_context(trace_context);
        let id = job.id;

        self.ledger.insert(&job).await?;
        self.state.lock().await.pending.push_back(job);
        self.notify.notify_one();

        info!(job_id = %id, "Job queued");
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
        let deadline = Instant::now() + wait;

        loop {
            while let Some((job, attempt)) = self.take_next(worker_id, lease).await {
                let lease_expires_at = lease_deadline(lease);
                match self
                    .ledger
                    .start(&job, worker_id, attempt, lease_expires_at)
                    .await
                {
                    Ok(Some(_)) => {
                        debug!(job_id = %job.id, worker_id = %worker_id, attempt, "Job claimed");
                        return Ok(Some(Claim {
                            job,
                            worker_id,
                            attempt,
                            lease_expires_at,
                        }));
                    }
                    Ok(None) => {
                        self.settle(job.id, worker_id).await;
                    }
                    Err(e) => {
                        // The delivery never reached a worker; undo it.
                        let mut state = self.state.lock().await;
                        if state.in_flight.remove(&job.id).is_some() {
                            if let Some(count) = state.deliveries.get_mut(&job.id) {
                                *count = count.saturating_sub(1);
                            }
                            state.pending.push_front(job);
                        }
                        return Err(e);
                    }
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }

            let wake = self.wake_at(deadline).await;
            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn heartbeat(&self, claim: &Claim, lease: Duration) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            match state.in_flight.get_mut(&claim.job_id()) {
                Some(flight) if flight.worker_id == claim.worker_id => {
                    flight.lease_until = Instant::now() + lease;
                }
                _ => {
                    return Err(Error::Internal(format!(
                        "lease on {} is no longer held by {}",
                        claim.job_id(),
                        claim.worker_id
                    )));
                }
            }
        }

        self.ledger
            .renew(claim.job_id(), claim.worker_id, lease_deadline(lease))
            .await
    }

    async fn complete(&self, claim: &Claim, result: &JobResult) -> Result<()> {
        if self.settle(claim.job_id(), claim.worker_id).await.is_none() {
            debug!(job_id = %claim.job_id(), "Completing a job whose lease was lost");
        }
        self.ledger.finish(&claim.job, result).await
    }

    async fn release(&self, claim: &Claim) -> Result<()> {
        let id = claim.job_id();
        let mut state = self.state.lock().await;
        let held = state
            .in_flight
            .get(&id)
            .is_some_and(|f| f.worker_id == claim.worker_id);
        if !held {
            return Ok(());
        }

        if let Some(flight) = state.in_flight.remove(&id) {
            state.pending.push_front(flight.job);
        }
        drop(state);
        self.notify.notify_one();
        debug!(job_id = %id, "Job released for redelivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptgate_cache::MemoryStore;

    const LEASE: Duration = Duration::from_secs(30);
    const NO_WAIT: Duration = Duration::ZERO;

    fn queue() -> (MemoryTaskQueue, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (MemoryTaskQueue::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_enqueue_records_queued_state() {
        let (queue, _) = queue();
        let id = queue
            .enqueue(JobPayload::new("heavy"), Some("00-abc-def-01".to_string()))
            .await
            .unwrap();

        assert_eq!(queue.job_state(id).await.unwrap(), JobState::Queued);
        assert!(queue.job_exists(id).await.unwrap());
        assert!(!queue.job_exists(JobId::new()).await.unwrap());
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_enqueue_ids_are_distinct() {
        let (queue, _) = queue();
        let a = queue.enqueue(JobPayload::new("same"), None).await.unwrap();
        let b = queue.enqueue(JobPayload::new("same"), None).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_claim_is_fifo_and_exclusive() {
        let (queue, _) = queue();
        let first = queue.enqueue(JobPayload::new("one"), None).await.unwrap();
        let second = queue.enqueue(JobPayload::new("two"), None).await.unwrap();

        let a = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        let b = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();

        assert_eq!(a.job_id(), first);
        assert_eq!(b.job_id(), second);
        assert_eq!(a.attempt, 1);
        assert!(queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().is_none());
        assert_eq!(queue.in_flight().await, 2);
    }

    #[tokio::test]
    async fn test_trace_context_travels_with_job() {
        let (queue, _) = queue();
        queue
            .enqueue(JobPayload::new("p"), Some("00-trace-span-01".to_string()))
            .await
            .unwrap();

        let claim = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        assert_eq!(claim.job.trace_context.as_deref(), Some("00-trace-span-01"));
    }

    #[tokio::test]
    async fn test_complete_records_outcome() {
        let (queue, _) = queue();
        let id = queue.enqueue(JobPayload::new("p"), None).await.unwrap();
        let claim = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        assert!(matches!(
            queue.job_state(id).await.unwrap(),
            JobState::Processing { attempt: 1, .. }
        ));

        queue.complete(&claim, &JobResult::done("42")).await.unwrap();

        assert_eq!(
            queue.job_state(id).await.unwrap(),
            JobState::Done {
                result: "42".to_string()
            }
        );
        assert_eq!(queue.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lease_is_redelivered() {
        let (queue, _) = queue();
        let id = queue.enqueue(JobPayload::new("p"), None).await.unwrap();

        let first = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        assert!(queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().is_none());

        tokio::time::advance(LEASE + Duration::from_secs(1)).await;

        let second = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        assert_eq!(second.job_id(), id);
        assert_eq!(second.attempt, 2);

        // The stale holder can no longer extend its lease.
        assert!(queue.heartbeat(&first, LEASE).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_keeps_the_lease() {
        let (queue, _) = queue();
        queue.enqueue(JobPayload::new("p"), None).await.unwrap();
        let claim = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(20)).await;
            queue.heartbeat(&claim, LEASE).await.unwrap();
        }

        assert!(queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_release_makes_job_claimable_again() {
        let (queue, _) = queue();
        let id = queue.enqueue(JobPayload::new("p"), None).await.unwrap();
        let claim = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();

        queue.release(&claim).await.unwrap();

        let again = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().unwrap();
        assert_eq!(again.job_id(), id);
        assert_eq!(again.attempt, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_waits_for_enqueue() {
        let (queue, _) = queue();
        let queue = Arc::new(queue);

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .claim(WorkerId::new(), LEASE, Duration::from_secs(5))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let id = queue.enqueue(JobPayload::new("late"), None).await.unwrap();

        let claim = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(claim.job_id(), id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_times_out_when_idle() {
        let (queue, _) = queue();
        let claimed = queue
            .claim(WorkerId::new(), LEASE, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_store_outage_keeps_job_queued() {
        let (queue, store) = queue();
        queue.enqueue(JobPayload::new("p"), None).await.unwrap();

        store.set_available(false);
        let err = queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap_err();
        assert!(err.is_store_unavailable());
        assert_eq!(queue.len().await, 1);

        store.set_available(true);
        assert!(queue.claim(WorkerId::new(), LEASE, NO_WAIT).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_store_is_down() {
        let (queue, store) = queue();
        store.set_available(false);

        let err = queue.enqueue(JobPayload::new("p"), None).await.unwrap_err();
        assert!(err.is_store_unavailable());
        assert!(queue.is_empty().await);
    }
}
