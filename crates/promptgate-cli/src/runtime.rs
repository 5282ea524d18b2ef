//! Process wiring for `serve` and `worker`.

use anyhow::{Context, bail};
use promptgate_api::{AppState, build_app};
use promptgate_cache::{MemoryStore, ResponseCache};
use promptgate_core::ports::{KeyValueStore, TaskQueue};
use promptgate_nats::NatsBackend;
use promptgate_queue::MemoryTaskQueue;
use promptgate_worker::WorkerPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::{AppConfig, BackendKind};

/// Store and queue handles for the configured backend.
struct Backend {
    store: Arc<dyn KeyValueStore>,
    queue: Arc<dyn TaskQueue>,
    nats: Option<NatsBackend>,
}

impl Backend {
    async fn open(config: &AppConfig) -> anyhow::Result<Self> {
        match config.backend {
            BackendKind::Memory => {
                info!("Using in-memory store and queue");
                let store = Arc::new(MemoryStore::new());
                let queue = Arc::new(MemoryTaskQueue::new(store.clone()));
                Ok(Self {
                    store,
                    queue,
                    nats: None,
                })
            }
            BackendKind::Nats => {
                let nats = NatsBackend::connect_with_config(config.nats.clone())
                    .await
                    .context("failed to connect to NATS")?;
                let store = Arc::new(nats.open_store().await?);
                let queue = Arc::new(nats.open_queue(store.clone()).await?);
                Ok(Self {
                    store,
                    queue,
                    nats: Some(nats),
                })
            }
        }
    }

    async fn close(self) {
        if let Some(nats) = self.nats {
            if let Err(e) = nats.shutdown().await {
                error!(error = %e, "Failed to close NATS connection");
            }
        }
    }

    fn start_pool(&self, config: &AppConfig) -> anyhow::Result<WorkerPool> {
        let compute = config.compute.heavy_service()?;
        let mut pool = WorkerPool::new(
            config.worker.clone(),
            self.queue.clone(),
            self.store.clone(),
            compute,
        )?;
        pool.start();
        info!(
            concurrency = config.worker.concurrency,
            lease_secs = config.worker.lease_secs,
            compute = ?config.compute.heavy_provider,
            "Worker pool running"
        );
        Ok(pool)
    }
}

/// Run the gateway until ctrl-c, optionally with an embedded worker pool.
pub async fn serve(config: AppConfig, with_workers: bool) -> anyhow::Result<()> {
    let backend = Backend::open(&config).await?;

    let chat = config.compute.chat_service()?;
    let cache = Arc::new(ResponseCache::new(backend.store.clone(), chat).with_ttl(config.cache.ttl()));
    let mut state = AppState::new(cache, backend.queue.clone(), backend.store.clone());
    if let Some(nats) = &backend.nats {
        state = state.with_backend_health(Arc::new(nats.clone()));
    }
    let state = Arc::new(state);

    let pool = if with_workers || config.worker.embedded {
        Some(backend.start_pool(&config)?)
    } else {
        None
    };

    let listener = TcpListener::bind(config.server.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr()))?;
    info!(
        addr = %listener.local_addr()?,
        backend = ?config.backend,
        embedded_workers = pool.is_some(),
        "Gateway listening"
    );

    let served = axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(pool) = pool {
        pool.shutdown().await;
    }
    backend.close().await;
    served.context("HTTP server failed")
}

/// Run a worker pool until ctrl-c.
pub async fn work(config: AppConfig) -> anyhow::Result<()> {
    if config.backend == BackendKind::Memory {
        bail!("the memory backend is single-process; use `promptgate serve` instead");
    }

    let backend = Backend::open(&config).await?;
    let pool = backend.start_pool(&config)?;

    shutdown_signal().await;

    pool.shutdown().await;
    backend.close().await;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
