//! Router tests against the in-memory adapters.

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use promptgate_api::{AppState, build_app};
use promptgate_cache::{MemoryStore, ResponseCache};
use promptgate_core::ports::{BackendHealth, ComputeService, TaskQueue};
use promptgate_core::{BackendReport, Error, HealthLevel, JobId, JobResult, Result, WorkerId};
use promptgate_queue::{MemoryTaskQueue, write_result};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tower::ServiceExt;

struct EchoCompute {
    calls: AtomicU32,
    fail: bool,
}

#[async_trait]
impl ComputeService for EchoCompute {
    async fn compute(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::UpstreamCompute("quota exceeded".to_string()));
        }
        Ok(format!("echo: {prompt}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct Gateway {
    app: Router,
    store: Arc<MemoryStore>,
    queue: Arc<MemoryTaskQueue>,
    compute: Arc<EchoCompute>,
}

fn gateway_with(fail: bool) -> Gateway {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryTaskQueue::new(store.clone()));
    let compute = Arc::new(EchoCompute {
        calls: AtomicU32::new(0),
        fail,
    });
    let cache = Arc::new(ResponseCache::new(store.clone(), compute.clone()));
    let state = Arc::new(AppState::new(cache, queue.clone(), store.clone()));
    Gateway {
        app: build_app(state),
        store,
        queue,
        compute,
    }
}

fn gateway() -> Gateway {
    gateway_with(false)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn submit(app: &Router, prompt: &str) -> String {
    let (status, body) = send(app, post_json("/api/heavy", &json!({ "prompt": prompt }).to_string())).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    body["jobId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_chat_miss_then_hit() {
    let gw = gateway();

    let (status, first) = send(&gw.app, post_json("/api/chat", r#"{"prompt":"Hello"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({ "source": "api", "data": "echo: Hello" }));

    let (status, second) = send(&gw.app, post_json("/api/chat", r#"{"prompt":"  HELLO "}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, json!({ "source": "cache", "data": "echo: Hello" }));
    assert_eq!(gw.compute.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_chat_rejects_missing_or_blank_prompt() {
    let gw = gateway();

    for body in [r#"{}"#, r#"{"prompt":""}"#, r#"{"prompt":"   "}"#, "not json"] {
        let (status, resp) = send(&gw.app, post_json("/api/chat", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body:?}");
        assert_eq!(resp, json!({ "error": "Prompt is required" }));
    }
    assert_eq!(gw.compute.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_chat_compute_failure_is_500_and_not_cached() {
    let gw = gateway_with(true);

    let (status, body) = send(&gw.app, post_json("/api/chat", r#"{"prompt":"hi"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "error": "Failed to fetch response from the compute service." })
    );
    assert!(gw.store.is_empty().await);
}

#[tokio::test]
async fn test_chat_store_outage_is_500() {
    let gw = gateway();
    gw.store.set_available(false);

    let (status, body) = send(&gw.app, post_json("/api/chat", r#"{"prompt":"hi"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "The response cache is unavailable." }));
    assert_eq!(gw.compute.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_heavy_submit_accepts_and_queues() {
    let gw = gateway();

    let (status, body) = send(&gw.app, post_json("/api/heavy", r#"{"prompt":"long essay"}"#)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Task accepted for processing.");
    let id = body["jobId"].as_str().unwrap();
    assert!(id.starts_with("job_"));
    assert_eq!(gw.queue.len().await, 1);
}

#[tokio::test]
async fn test_heavy_submit_rejects_blank_prompt() {
    let gw = gateway();

    let (status, body) = send(&gw.app, post_json("/api/heavy", r#"{"prompt":" "}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Prompt is required for the heavy task." }));
    assert!(gw.queue.is_empty().await);
}

#[tokio::test]
async fn test_identical_submissions_get_distinct_ids() {
    let gw = gateway();

    let (a, b) = tokio::join!(submit(&gw.app, "same"), submit(&gw.app, "same"));
    assert_ne!(a, b);
    assert_eq!(gw.queue.len().await, 2);
}

#[tokio::test]
async fn test_heavy_submit_propagates_traceparent() {
    let gw = gateway();
    let traceparent = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";
    let request = Request::builder()
        .method("POST")
        .uri("/api/heavy")
        .header(header::CONTENT_TYPE, "application/json")
        .header("traceparent", traceparent)
        .body(Body::from(r#"{"prompt":"traced"}"#))
        .unwrap();

    let (status, _) = send(&gw.app, request).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let claim = gw
        .queue
        .claim(WorkerId::new(), Duration::from_secs(30), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claim.job.trace_context.as_deref(), Some(traceparent));
}

#[tokio::test]
async fn test_heavy_submit_store_outage_is_500() {
    let gw = gateway();
    gw.store.set_available(false);

    let (status, body) = send(&gw.app, post_json("/api/heavy", r#"{"prompt":"x"}"#)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Could not queue the task." }));
}

#[tokio::test]
async fn test_poll_lifecycle() {
    let gw = gateway();
    let id = submit(&gw.app, "essay").await;
    let uri = format!("/api/heavy/{id}");

    let (status, body) = send(&gw.app, get(&uri)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body,
        json!({ "status": "processing", "message": "Job is still being processed." })
    );

    let claim = gw
        .queue
        .claim(WorkerId::new(), Duration::from_secs(30), Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    let (status, _) = send(&gw.app, get(&uri)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let result = JobResult::done("the essay");
    write_result(gw.store.as_ref(), claim.job_id(), &result).await.unwrap();
    gw.queue.complete(&claim, &result).await.unwrap();

    let (status, body) = send(&gw.app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "done", "result": "the essay" }));
}

#[tokio::test]
async fn test_poll_failed_job() {
    let gw = gateway();
    let id = submit(&gw.app, "essay").await;
    let job_id: JobId = id.parse().unwrap();
    write_result(gw.store.as_ref(), job_id, &JobResult::failed("model exploded"))
        .await
        .unwrap();

    let (status, body) = send(&gw.app, get(&format!("/api/heavy/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "failed", "error": "model exploded" }));
}

#[tokio::test]
async fn test_poll_unknown_and_malformed_ids() {
    let gw = gateway();

    for id in [JobId::new().to_string(), "not-a-job".to_string()] {
        let (status, body) = send(&gw.app, get(&format!("/api/heavy/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "status": "not_found", "message": "Job not found." }));
    }
}

#[tokio::test]
async fn test_poll_store_outage_is_500() {
    let gw = gateway();
    let id = submit(&gw.app, "essay").await;
    gw.store.set_available(false);

    let (status, body) = send(&gw.app, get(&format!("/api/heavy/{id}"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Could not fetch job status." }));
}

#[tokio::test]
async fn test_health_reports_cache_counters() {
    let gw = gateway();
    send(&gw.app, post_json("/api/chat", r#"{"prompt":"a"}"#)).await;
    send(&gw.app, post_json("/api/chat", r#"{"prompt":"a"}"#)).await;

    let (status, body) = send(&gw.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cache"]["hits"], 1);
    assert_eq!(body["cache"]["misses"], 1);
}

struct DegradedBackend;

impl BackendHealth for DegradedBackend {
    fn report(&self) -> BackendReport {
        BackendReport::new("nats", HealthLevel::Degraded)
            .with_reason("3 failed NATS operations recorded")
            .with_counter("kv_failures", 3)
    }
}

#[tokio::test]
async fn test_health_includes_backend_report() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryTaskQueue::new(store.clone()));
    let compute = Arc::new(EchoCompute {
        calls: AtomicU32::new(0),
        fail: false,
    });
    let cache = Arc::new(ResponseCache::new(store.clone(), compute));
    let state = AppState::new(cache, queue, store).with_backend_health(Arc::new(DegradedBackend));
    let app = build_app(Arc::new(state));

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["backend"]["backend"], "nats");
    assert_eq!(body["backend"]["counters"]["kv_failures"], 3);
}

#[tokio::test]
async fn test_health_omits_backend_without_one() {
    let gw = gateway();
    let (_, body) = send(&gw.app, get("/health")).await;
    assert!(body.get("backend").is_none());
}

#[tokio::test]
async fn test_ready_follows_store() {
    let gw = gateway();

    let (status, _) = send(&gw.app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);

    gw.store.set_available(false);
    let (status, body) = send(&gw.app, get("/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unavailable");
}

#[tokio::test]
async fn test_request_id_is_generated_or_echoed() {
    let gw = gateway();

    let response = gw.app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = gw.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-42");
}
