//! Worker pool: independent claim loops sharing one executor.

use crate::config::WorkerConfig;
use crate::executor::{JobExecutor, JobOutcome};
use promptgate_core::ports::{ComputeService, KeyValueStore, TaskQueue};
use promptgate_core::{Result, WorkerId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const MIN_ERROR_BACKOFF: Duration = Duration::from_millis(500);
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Pool state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
    Draining,
}

/// Counters shared between the pool handle and its loops.
#[derive(Default)]
struct PoolState {
    busy: AtomicUsize,
    processed: AtomicUsize,
    draining: AtomicBool,
}

/// A set of worker loops pulling from one queue.
pub struct WorkerPool {
    config: WorkerConfig,
    queue: Arc<dyn TaskQueue>,
    executor: Arc<JobExecutor>,
    state: Arc<PoolState>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        config: WorkerConfig,
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn KeyValueStore>,
        compute: Arc<dyn ComputeService>,
    ) -> Result<Self> {
        config.validate()?;

        let executor = JobExecutor::new(queue.clone(), store, compute)
            .with_lease(config.lease(), config.heartbeat_interval())
            .with_max_attempts(config.max_attempts);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            queue,
            executor: Arc::new(executor),
            state: Arc::new(PoolState::default()),
            shutdown_tx,
            handles: Vec::new(),
        })
    }

    /// Spawn the worker loops. Calling it again has no effect.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }

        info!(
            pool = %self.config.name,
            concurrency = self.config.concurrency,
            "Starting worker pool"
        );

        for _ in 0..self.config.concurrency {
            let worker = WorkerLoop {
                worker_id: WorkerId::new(),
                queue: self.queue.clone(),
                executor: self.executor.clone(),
                state: self.state.clone(),
                lease: self.config.lease(),
                poll_wait: self.config.poll_wait(),
            };
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.handles.push(tokio::spawn(worker.run(shutdown_rx)));
        }
    }

    pub fn status(&self) -> WorkerStatus {
        if self.state.draining.load(Ordering::SeqCst) {
            WorkerStatus::Draining
        } else if self.busy() > 0 {
            WorkerStatus::Busy
        } else {
            WorkerStatus::Idle
        }
    }

    /// Loops currently executing a job.
    pub fn busy(&self) -> usize {
        self.state.busy.load(Ordering::SeqCst)
    }

    /// Jobs settled since start.
    pub fn processed(&self) -> usize {
        self.state.processed.load(Ordering::SeqCst)
    }

    /// Stop claiming and wait for running jobs to finish.
    pub async fn shutdown(self) {
        info!(pool = %self.config.name, busy = self.busy(), "Draining worker pool");
        self.state.draining.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker loop ended abnormally");
            }
        }
        info!(pool = %self.config.name, "Worker pool stopped");
    }
}

struct WorkerLoop {
    worker_id: WorkerId,
    queue: Arc<dyn TaskQueue>,
    executor: Arc<JobExecutor>,
    state: Arc<PoolState>,
    lease: Duration,
    poll_wait: Duration,
}

impl WorkerLoop {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        debug!(worker_id = %self.worker_id, "Worker loop started");
        let mut backoff = MIN_ERROR_BACKOFF;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let claimed = tokio::select! {
                claimed = self.queue.claim(self.worker_id, self.lease, self.poll_wait) => claimed,
                _ = shutdown_rx.changed() => break,
            };

            match claimed {
                Ok(Some(claim)) => {
                    backoff = MIN_ERROR_BACKOFF;
                    self.state.busy.fetch_add(1, Ordering::SeqCst);
                    let job_id = claim.job_id();

                    match self.executor.execute(claim).await {
                        Ok(JobOutcome::Duplicate) => {
                            debug!(job_id = %job_id, "Dropped duplicate delivery")
                        }
                        Ok(_) => {
                            self.state.processed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(e) => error!(job_id = %job_id, error = %e, "Job execution error"),
                    }

                    self.state.busy.fetch_sub(1, Ordering::SeqCst);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "Failed to claim job");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                    backoff = (backoff * 2).min(MAX_ERROR_BACKOFF);
                }
            }
        }

        debug!(worker_id = %self.worker_id, "Worker loop stopped");
    }
}
