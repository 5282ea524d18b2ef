//! Cache-aside chat responses.

use crate::keys::{cache_key, normalize_prompt};
use crate::types::{CacheStats, CacheStatsSnapshot, CachedResponse, ResponseSource};
use promptgate_core::ports::{ComputeService, KeyValueStore};
use promptgate_core::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default lifetime of a cached response.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Serves prompts from the shared store, computing and populating on a miss.
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    compute: Arc<dyn ComputeService>,
    ttl: Duration,
    stats: CacheStats,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>, compute: Arc<dyn ComputeService>) -> Self {
        Self {
            store,
            compute,
            ttl: DEFAULT_CACHE_TTL,
            stats: CacheStats::default(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Answer a prompt.
    ///
    /// Store failures abort the request with [`Error::StoreUnavailable`]; a
    /// failed compute call leaves the cache untouched.
    pub async fn respond(&self, prompt: &str) -> Result<CachedResponse> {
        if normalize_prompt(prompt).is_empty() {
            return Err(Error::Validation("Prompt is required".to_string()));
        }

        let key = cache_key(prompt);

        if let Some(bytes) = self.store.get(&key).await? {
            match serde_json::from_slice::<String>(&bytes) {
                Ok(data) => {
                    self.stats.record_hit();
                    debug!(key = %key, "Cache hit");
                    return Ok(CachedResponse {
                        source: ResponseSource::Cache,
                        data,
                    });
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Unreadable cache entry, recomputing");
                }
            }
        }

        self.stats.record_miss();
        info!(key = %key, compute = self.compute.name(), "Cache miss, calling compute service");

        let data = match self.compute.compute(prompt).await {
            Ok(data) => data,
            Err(e) => {
                self.stats.record_compute_failure();
                return Err(match e {
                    Error::UpstreamCompute(_) => e,
                    other => Error::UpstreamCompute(other.to_string()),
                });
            }
        };

        let encoded = serde_json::to_vec(&data)?;
        self.store.set_with_ttl(&key, &encoded, self.ttl).await?;
        self.stats.record_write();

        Ok(CachedResponse {
            source: ResponseSource::Api,
            data,
        })
    }
}
