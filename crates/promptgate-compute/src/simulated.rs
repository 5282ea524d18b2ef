//! Stand-in compute for long-running jobs.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use promptgate_core::Result;
use promptgate_core::ports::ComputeService;
use std::time::Duration;
use tracing::debug;

/// Sleeps for a fixed delay, then reports completion.
#[derive(Debug, Clone)]
pub struct SimulatedCompute {
    delay: Duration,
}

impl SimulatedCompute {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedCompute {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl ComputeService for SimulatedCompute {
    async fn compute(&self, prompt: &str) -> Result<String> {
        debug!(delay_ms = self.delay.as_millis() as u64, "Simulating heavy task");
        tokio::time::sleep(self.delay).await;

        Ok(format!(
            "Heavy task for '{}' is complete. Processed at {}",
            prompt,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        ))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
