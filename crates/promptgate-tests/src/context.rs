//! Test context providing access to the store and queue under test.

use crate::containers::NatsContainer;
use promptgate_cache::MemoryStore;
use promptgate_core::ports::{KeyValueStore, TaskQueue};
use promptgate_nats::{NatsBackend, NatsConfig};
use promptgate_queue::MemoryTaskQueue;
use std::sync::Arc;
use std::time::Duration;

/// Lease used by NATS-backed contexts. Short, so redelivery tests finish
/// quickly.
pub const TEST_LEASE: Duration = Duration::from_secs(2);

/// A store and queue, plus whatever keeps them alive.
///
/// Drop this to stop the container, if any.
pub struct TestContext {
    pub nats: Option<NatsContainer>,
    pub backend: Option<NatsBackend>,
    pub store: Arc<dyn KeyValueStore>,
    pub queue: Arc<dyn TaskQueue>,
}

impl TestContext {
    /// In-process adapters; no Docker needed.
    pub fn memory() -> Self {
        crate::init_test_logging();

        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryTaskQueue::new(store.clone()));
        Self {
            nats: None,
            backend: None,
            store,
            queue,
        }
    }

    /// A fresh NATS server with JetStream, with `ack_wait` set to
    /// [`TEST_LEASE`].
    pub async fn nats() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let nats = NatsContainer::start().await?;
        let config = NatsConfig::new(nats.url()).with_ack_wait(TEST_LEASE);
        let backend = NatsBackend::connect_with_config(config).await?;
        let store = Arc::new(backend.open_store().await?);
        let queue = Arc::new(backend.open_queue(store.clone()).await?);

        Ok(Self {
            nats: Some(nats),
            backend: Some(backend),
            store,
            queue,
        })
    }

    /// Open a second queue handle on the same stream, as another process
    /// would.
    pub async fn second_queue(&self) -> anyhow::Result<Arc<dyn TaskQueue>> {
        match &self.backend {
            Some(backend) => {
                let store = Arc::new(backend.open_store().await?);
                Ok(Arc::new(backend.open_queue(store).await?))
            }
            None => anyhow::bail!("in-memory queues cannot be shared between handles"),
        }
    }
}
