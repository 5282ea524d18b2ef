//! [`KeyValueStore`] on a JetStream KV bucket.

use async_nats::jetstream::kv;
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use promptgate_core::Result;
use promptgate_core::ports::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::connection::unavailable;
use crate::metrics::NatsMetrics;

/// Stored form of every value.
///
/// JetStream KV has no per-key TTL, so the deadline travels with the value.
/// The bucket's `max_age` still evicts everything eventually.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

impl Envelope {
    fn new(value: &[u8], ttl: Option<Duration>) -> Self {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);
        Self {
            value: STANDARD.encode(value),
            expires_at,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }

    fn decode(&self) -> Option<Vec<u8>> {
        STANDARD.decode(&self.value).ok()
    }
}

/// Store backed by one KV bucket (`history = 1`).
pub struct NatsKvStore {
    bucket: kv::Store,
    client: async_nats::Client,
    metrics: Arc<NatsMetrics>,
}

impl NatsKvStore {
    pub(crate) fn new(bucket: kv::Store, client: async_nats::Client, metrics: Arc<NatsMetrics>) -> Self {
        Self {
            bucket,
            client,
            metrics,
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket.name
    }

    async fn put(&self, key: &str, envelope: &Envelope) -> Result<()> {
        let bytes = serde_json::to_vec(envelope)?;
        match self.bucket.put(key, bytes.into()).await {
            Ok(_) => {
                self.metrics.record_kv_write();
                Ok(())
            }
            Err(e) => {
                self.metrics.record_kv_failure();
                Err(unavailable("KV put failed", e))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for NatsKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let raw = match self.bucket.get(key).await {
            Ok(raw) => raw,
            Err(e) => {
                self.metrics.record_kv_failure();
                return Err(unavailable("KV get failed", e));
            }
        };
        self.metrics.record_kv_read();

        let Some(raw) = raw else {
            return Ok(None);
        };

        let envelope: Envelope = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Unreadable KV entry, treating as absent");
                return Ok(None);
            }
        };

        if envelope.is_expired(Utc::now()) {
            debug!(key, "Purging expired KV entry");
            if let Err(e) = self.bucket.delete(key).await {
                warn!(key, error = %e, "Failed to delete expired KV entry");
            }
            return Ok(None);
        }

        Ok(envelope.decode())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put(key, &Envelope::new(value, None)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.put(key, &Envelope::new(value, Some(ttl))).await
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        let bytes = serde_json::to_vec(&Envelope::new(value, None))?;
        match self.bucket.create(key, bytes.into()).await {
            Ok(_) => {
                self.metrics.record_kv_write();
                Ok(true)
            }
            Err(e) if matches!(e.kind(), kv::CreateErrorKind::AlreadyExists) => {
                debug!(key, "Key already set, keeping stored value");
                Ok(false)
            }
            Err(e) => {
                self.metrics.record_kv_failure();
                Err(unavailable("KV create failed", e))
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        if self.client.connection_state() != async_nats::connection::State::Connected {
            return Err(promptgate_core::Error::StoreUnavailable(
                "not connected to NATS".to_string(),
            ));
        }
        self.bucket
            .status()
            .await
            .map(|_| ())
            .map_err(|e| unavailable("KV status failed", e))
    }
}
