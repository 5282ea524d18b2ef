//! In-process [`KeyValueStore`] for tests and single-process deployments.

use async_trait::async_trait;
use promptgate_core::ports::KeyValueStore;
use promptgate_core::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// TTL-aware map behind a tokio `RwLock`.
///
/// Deadlines use the tokio clock, so tests can pause and advance time.
/// Expired entries read as absent and are purged on access.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the backend.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::StoreUnavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        }
    }

    async fn insert(&self, key: &str, value: &[u8], expires_at: Option<Instant>) -> Result<()> {
        self.check_available()?;
        self.entries.write().await.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: purge unless a concurrent writer replaced it.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
            debug!(key, "Purged expired entry");
        }
        Ok(entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.insert(key, value, None).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.insert(key, value, Some(Instant::now() + ttl)).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_expired(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
