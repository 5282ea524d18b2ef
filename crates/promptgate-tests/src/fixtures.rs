//! Compute doubles for end-to-end tests.

use async_trait::async_trait;
use promptgate_core::ports::ComputeService;
use promptgate_core::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Deterministic compute: answers `computed: <prompt>` after `delay`, and
/// fails any prompt containing "fail".
pub struct ScriptedCompute {
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedCompute {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicU32::new(0),
        })
    }

    pub fn instant() -> Arc<Self> {
        Self::new(Duration::ZERO)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// What a successful call returns for `prompt`.
    pub fn answer(prompt: &str) -> String {
        format!("computed: {prompt}")
    }
}

#[async_trait]
impl ComputeService for ScriptedCompute {
    async fn compute(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if prompt.contains("fail") {
            return Err(Error::UpstreamCompute(format!("refused: {prompt}")));
        }
        Ok(Self::answer(prompt))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_compute() {
        let compute = ScriptedCompute::instant();

        assert_eq!(compute.compute("hi").await.unwrap(), "computed: hi");
        assert!(compute.compute("please fail").await.is_err());
        assert_eq!(compute.calls(), 2);
    }
}
