//! Test helper functions and utilities.

use crate::context::{TEST_LEASE, TestContext};
use promptgate_api::{AppState, build_app};
use promptgate_cache::ResponseCache;
use promptgate_core::ports::ComputeService;
use promptgate_worker::{WorkerConfig, WorkerPool};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Start the gateway on a random local port and return its address.
pub async fn start_test_server(
    ctx: &TestContext,
    chat: Arc<dyn ComputeService>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let cache = Arc::new(ResponseCache::new(ctx.store.clone(), chat));
    let state = Arc::new(AppState::new(cache, ctx.queue.clone(), ctx.store.clone()));

    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("test server stopped: {e}");
        }
    });

    Ok((addr, handle))
}

/// Worker settings scaled down for tests.
pub fn test_worker_config(concurrency: usize) -> WorkerConfig {
    WorkerConfig {
        name: "test-workers".to_string(),
        concurrency,
        lease_secs: TEST_LEASE.as_secs(),
        heartbeat_interval_secs: 1,
        poll_wait_secs: 1,
        ..Default::default()
    }
}

/// Start a worker pool on the context's queue.
pub fn start_workers(
    ctx: &TestContext,
    compute: Arc<dyn ComputeService>,
    concurrency: usize,
) -> anyhow::Result<WorkerPool> {
    let mut pool = WorkerPool::new(
        test_worker_config(concurrency),
        ctx.queue.clone(),
        ctx.store.clone(),
        compute,
    )?;
    pool.start();
    Ok(pool)
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// API test client with base URL.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// `POST /api/chat`, returning status and body.
    pub async fn chat(&self, prompt: &str) -> anyhow::Result<(StatusCode, Value)> {
        let resp = self.post("/api/chat", &json!({ "prompt": prompt })).await?;
        Ok((resp.status(), resp.json().await?))
    }

    /// `POST /api/heavy`, returning the job id.
    pub async fn submit(&self, prompt: &str) -> anyhow::Result<String> {
        let resp = self.post("/api/heavy", &json!({ "prompt": prompt })).await?;
        anyhow::ensure!(
            resp.status() == StatusCode::ACCEPTED,
            "submit returned {}",
            resp.status()
        );
        let body: Value = resp.json().await?;
        body["jobId"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| anyhow::anyhow!("no jobId in {body}"))
    }

    /// `GET /api/heavy/{id}`, returning status and body.
    pub async fn poll(&self, id: &str) -> anyhow::Result<(StatusCode, Value)> {
        let resp = self.get(&format!("/api/heavy/{id}")).await?;
        Ok((resp.status(), resp.json().await?))
    }

    /// Poll until the job leaves the processing state.
    pub async fn wait_for_job(&self, id: &str, timeout: Duration) -> anyhow::Result<(StatusCode, Value)> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (status, body) = self.poll(id).await?;
            if status != StatusCode::ACCEPTED {
                return Ok((status, body));
            }
            anyhow::ensure!(
                tokio::time::Instant::now() < deadline,
                "job {id} still processing after {timeout:?}"
            );
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Check health endpoint.
    pub async fn health(&self) -> anyhow::Result<bool> {
        let resp = self.get("/health").await?;
        Ok(resp.status().is_success())
    }

    /// Check readiness endpoint.
    pub async fn ready(&self) -> anyhow::Result<bool> {
        let resp = self.get("/ready").await?;
        Ok(resp.status().is_success())
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}
