//! Lease renewal while a job runs.

use promptgate_core::Claim;
use promptgate_core::ports::TaskQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, warn};

/// Background task that extends a claim's lease on a fixed interval.
///
/// Renewal stops for good once the queue reports the lease is no longer
/// held. A store outage is retried on the next tick.
pub struct LeaseHeartbeat {
    stop_tx: watch::Sender<bool>,
    lost_rx: watch::Receiver<bool>,
    handle: JoinHandle<()>,
}

impl LeaseHeartbeat {
    pub fn start(queue: Arc<dyn TaskQueue>, claim: Claim, every: Duration, lease: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let (lost_tx, lost_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match queue.heartbeat(&claim, lease).await {
                            Ok(()) => debug!(job_id = %claim.job_id(), "Lease renewed"),
                            Err(e) if e.is_store_unavailable() => {
                                warn!(job_id = %claim.job_id(), error = %e, "Failed to renew lease")
                            }
                            Err(e) => {
                                warn!(job_id = %claim.job_id(), error = %e, "Lease lost");
                                let _ = lost_tx.send(true);
                                break;
                            }
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
        });

        Self {
            stop_tx,
            lost_rx,
            handle,
        }
    }

    /// Stop renewing and wait for the task to exit.
    ///
    /// Returns `false` if the lease was lost while the heartbeat ran.
    pub async fn stop(self) -> bool {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
        !*self.lost_rx.borrow()
    }
}
