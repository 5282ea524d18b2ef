//! Health of the NATS backend, derived from its counters.

use crate::connection::NatsBackend;
use crate::metrics::MetricsSnapshot;
use promptgate_core::ports::BackendHealth;
use promptgate_core::{BackendReport, HealthLevel};

/// Health of the connection plus the counters it was judged on.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub status: HealthLevel,
    pub reason: Option<String>,
    pub connected: bool,
    pub metrics: MetricsSnapshot,
}

impl HealthCheck {
    /// Disconnected is unhealthy; any recorded publish or KV failure degrades.
    pub fn evaluate(metrics: MetricsSnapshot, connected: bool) -> Self {
        let failures = metrics.publish_failures + metrics.kv_failures;
        let (status, reason) = if !connected {
            (HealthLevel::Unhealthy, Some("Not connected to NATS".to_string()))
        } else if failures > 0 {
            (
                HealthLevel::Degraded,
                Some(format!("{} failed NATS operations recorded", failures)),
            )
        } else {
            (HealthLevel::Healthy, None)
        };

        Self {
            status,
            reason,
            connected,
            metrics,
        }
    }

    pub fn into_report(self) -> BackendReport {
        let m = &self.metrics;
        let report = BackendReport::new("nats", self.status)
            .with_counter("jobs_published", m.jobs_published)
            .with_counter("jobs_delivered", m.jobs_delivered)
            .with_counter("redeliveries", m.redeliveries)
            .with_counter("jobs_acked", m.jobs_acked)
            .with_counter("jobs_nacked", m.jobs_nacked)
            .with_counter("publish_failures", m.publish_failures)
            .with_counter("kv_reads", m.kv_reads)
            .with_counter("kv_writes", m.kv_writes)
            .with_counter("kv_failures", m.kv_failures);
        match self.reason {
            Some(reason) => report.with_reason(reason),
            None => report,
        }
    }
}

impl BackendHealth for NatsBackend {
    fn report(&self) -> BackendReport {
        self.health_check().into_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_is_unhealthy() {
        let check = HealthCheck::evaluate(MetricsSnapshot::default(), false);
        assert_eq!(check.status, HealthLevel::Unhealthy);
    }

    #[test]
    fn test_failures_degrade() {
        assert_eq!(
            HealthCheck::evaluate(MetricsSnapshot::default(), true).status,
            HealthLevel::Healthy
        );

        let failing = MetricsSnapshot {
            kv_failures: 2,
            ..Default::default()
        };
        let check = HealthCheck::evaluate(failing, true);
        assert_eq!(check.status, HealthLevel::Degraded);
        assert_eq!(check.reason.as_deref(), Some("2 failed NATS operations recorded"));
    }

    #[test]
    fn test_report_carries_counters() {
        let metrics = MetricsSnapshot {
            jobs_published: 4,
            redeliveries: 1,
            connected: true,
            ..Default::default()
        };
        let report = HealthCheck::evaluate(metrics, true).into_report();

        assert_eq!(report.backend, "nats");
        assert_eq!(report.status, HealthLevel::Healthy);
        assert!(report.reason.is_none());
        assert_eq!(report.counters["jobs_published"], 4);
        assert_eq!(report.counters["redeliveries"], 1);
    }
}
