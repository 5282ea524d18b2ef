//! Configuration for the NATS backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection, bucket and stream settings.
///
/// Durations are whole seconds so the struct loads straight from config files
/// and environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URLs (several for a cluster).
    pub urls: Vec<String>,
    /// KV bucket holding cache entries and job records.
    pub bucket: String,
    /// JetStream stream carrying job messages.
    pub stream_name: String,
    /// Subject jobs are published on.
    pub subject: String,
    /// Durable consumer shared by all workers.
    pub consumer_name: String,
    pub connection_timeout_secs: u64,
    /// Request timeout for JetStream operations.
    pub request_timeout_secs: u64,
    /// How long an unacknowledged delivery stays invisible. This is the
    /// lease length for NATS-backed workers.
    pub ack_wait_secs: u64,
    /// Retention backstop for bucket entries and unconsumed jobs.
    pub max_age_secs: u64,
    /// Window in which a republished job id is dropped as a duplicate.
    pub duplicate_window_secs: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            urls: vec!["nats://localhost:4222".to_string()],
            bucket: "promptgate".to_string(),
            stream_name: "PROMPTGATE_JOBS".to_string(),
            subject: "promptgate.jobs".to_string(),
            consumer_name: "promptgate-workers".to_string(),
            connection_timeout_secs: 10,
            request_timeout_secs: 5,
            ack_wait_secs: 30,
            max_age_secs: 86400 * 7, // 7 days
            duplicate_window_secs: 120,
        }
    }
}

impl NatsConfig {
    /// Create a new config with a single URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            ..Default::default()
        }
    }

    /// Set multiple server URLs for cluster support.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the stream name. The subject and consumer follow it unless set
    /// separately.
    pub fn with_stream_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = name.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait_secs = ack_wait.as_secs().max(1);
        self
    }

    /// Comma-separated server list, as accepted by `async_nats::connect`.
    pub fn server_list(&self) -> String {
        self.urls.join(",")
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn ack_wait(&self) -> Duration {
        Duration::from_secs(self.ack_wait_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = NatsConfig::new("nats://nats-1:4222")
            .with_bucket("test-bucket")
            .with_stream_name("TEST_JOBS")
            .with_subject("test.jobs")
            .with_ack_wait(Duration::from_secs(45));

        assert_eq!(config.bucket, "test-bucket");
        assert_eq!(config.stream_name, "TEST_JOBS");
        assert_eq!(config.subject, "test.jobs");
        assert_eq!(config.ack_wait(), Duration::from_secs(45));
    }

    #[test]
    fn test_cluster_server_list() {
        let config = NatsConfig::default().with_urls(vec![
            "nats://a:4222".to_string(),
            "nats://b:4222".to_string(),
        ]);
        assert_eq!(config.server_list(), "nats://a:4222,nats://b:4222");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: NatsConfig =
            serde_json::from_str(r#"{"urls":["nats://prod:4222"],"ack_wait_secs":60}"#).unwrap();

        assert_eq!(config.urls, vec!["nats://prod:4222"]);
        assert_eq!(config.ack_wait(), Duration::from_secs(60));
        assert_eq!(config.bucket, "promptgate");
        assert_eq!(config.max_age(), Duration::from_secs(7 * 86400));
    }
}
