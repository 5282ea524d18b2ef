//! Backend health as reported on `/health`.

use serde::Serialize;
use std::collections::BTreeMap;

/// Coarse health of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Healthy,
    /// Reachable, but operations have been failing.
    Degraded,
    Unhealthy,
}

impl HealthLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Degraded => "degraded",
            HealthLevel::Unhealthy => "unhealthy",
        }
    }
}

/// Point-in-time report from a backend: its level plus whatever counters it
/// keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendReport {
    pub backend: String,
    pub status: HealthLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub counters: BTreeMap<String, u64>,
}

impl BackendReport {
    pub fn new(backend: impl Into<String>, status: HealthLevel) -> Self {
        Self {
            backend: backend.into(),
            status,
            reason: None,
            counters: BTreeMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_counter(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }
}
