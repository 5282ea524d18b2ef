//! Counters for the NATS backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by the store and the queue.
#[derive(Debug, Default)]
pub struct NatsMetrics {
    /// Jobs published to the stream.
    pub jobs_published: AtomicU64,
    /// Jobs handed to workers, redeliveries included.
    pub jobs_delivered: AtomicU64,
    /// Deliveries that were not the first for their job.
    pub redeliveries: AtomicU64,
    pub jobs_acked: AtomicU64,
    pub jobs_nacked: AtomicU64,
    pub publish_failures: AtomicU64,
    pub kv_reads: AtomicU64,
    pub kv_writes: AtomicU64,
    /// Store operations that failed at the backend.
    pub kv_failures: AtomicU64,
    /// Current connection state (0 = disconnected, 1 = connected).
    pub connected: AtomicU64,
}

impl NatsMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_publish(&self) {
        self.jobs_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery; `attempt` is the server's delivery count.
    pub fn record_delivery(&self, attempt: u32) {
        self.jobs_delivered.fetch_add(1, Ordering::Relaxed);
        if attempt > 1 {
            self.redeliveries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_ack(&self) {
        self.jobs_acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nack(&self) {
        self.jobs_nacked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kv_read(&self) {
        self.kv_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kv_write(&self) {
        self.kv_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_kv_failure(&self) {
        self.kv_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_published: self.jobs_published.load(Ordering::Relaxed),
            jobs_delivered: self.jobs_delivered.load(Ordering::Relaxed),
            redeliveries: self.redeliveries.load(Ordering::Relaxed),
            jobs_acked: self.jobs_acked.load(Ordering::Relaxed),
            jobs_nacked: self.jobs_nacked.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            kv_reads: self.kv_reads.load(Ordering::Relaxed),
            kv_writes: self.kv_writes.load(Ordering::Relaxed),
            kv_failures: self.kv_failures.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed) == 1,
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub jobs_published: u64,
    pub jobs_delivered: u64,
    pub redeliveries: u64,
    pub jobs_acked: u64,
    pub jobs_nacked: u64,
    pub publish_failures: u64,
    pub kv_reads: u64,
    pub kv_writes: u64,
    pub kv_failures: u64,
    pub connected: bool,
}
