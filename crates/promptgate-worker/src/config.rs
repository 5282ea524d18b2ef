//! Worker configuration.

use promptgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Pool name, used in logs.
    #[serde(default = "default_name")]
    pub name: String,
    /// Independent claim loops, each running one job at a time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Lease taken on each claimed job, in seconds.
    #[serde(default = "default_lease")]
    pub lease_secs: u64,
    /// Lease renewal interval in seconds. Must be shorter than the lease.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// How long one claim call waits for work, in seconds.
    #[serde(default = "default_poll_wait")]
    pub poll_wait_secs: u64,
    /// Deliveries after which a job is failed instead of retried.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Run the pool inside the gateway process.
    #[serde(default)]
    pub embedded: bool,
}

fn default_name() -> String {
    "promptgate-worker".to_string()
}

fn default_concurrency() -> usize {
    4
}

fn default_lease() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    10
}

fn default_poll_wait() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            concurrency: default_concurrency(),
            lease_secs: default_lease(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            poll_wait_secs: default_poll_wait(),
            max_attempts: default_max_attempts(),
            embedded: false,
        }
    }
}

impl WorkerConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Configuration(
                "worker.concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::Configuration(
                "worker.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval_secs == 0 || self.heartbeat_interval_secs >= self.lease_secs {
            return Err(Error::Configuration(format!(
                "worker.heartbeat_interval_secs ({}) must be between 1 and the lease ({})",
                self.heartbeat_interval_secs, self.lease_secs
            )));
        }
        Ok(())
    }
}
