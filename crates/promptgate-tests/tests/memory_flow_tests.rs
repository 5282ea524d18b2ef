//! End-to-end flows over HTTP against the in-memory adapters.
//!
//! Run with: `cargo test -p promptgate-tests --test memory_flow_tests`

use promptgate_tests::{
    ApiTestClient, ScriptedCompute, TestContext, start_test_server, start_workers,
};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

const JOB_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_health_and_ready() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .expect("Failed to start server");

    let client = ApiTestClient::new(addr);
    assert!(client.health().await.unwrap());
    assert!(client.ready().await.unwrap());
}

#[tokio::test]
async fn test_chat_is_cached_across_prompt_variants() {
    let ctx = TestContext::memory();
    let compute = ScriptedCompute::instant();
    let (addr, _handle) = start_test_server(&ctx, compute.clone()).await.unwrap();
    let client = ApiTestClient::new(addr);

    let (status, first) = client.chat("Hello").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "api");

    let (status, second) = client.chat(" HELLO ").await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["source"], "cache");
    assert_eq!(second["data"], first["data"]);
    assert_eq!(compute.calls(), 1);
}

#[tokio::test]
async fn test_heavy_job_completes() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let pool = start_workers(&ctx, ScriptedCompute::new(Duration::from_millis(200)), 2).unwrap();
    let client = ApiTestClient::new(addr);

    let id = client.submit("write an essay").await.unwrap();
    let (status, body) = client.wait_for_job(&id, JOB_TIMEOUT).await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "status": "done", "result": ScriptedCompute::answer("write an essay") })
    );
    pool.shutdown().await;
}

#[tokio::test]
async fn test_failing_job_reports_failure() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let pool = start_workers(&ctx, ScriptedCompute::instant(), 1).unwrap();
    let client = ApiTestClient::new(addr);

    let failing = client.submit("please fail").await.unwrap();
    let fine = client.submit("fine").await.unwrap();

    let (status, body) = client.wait_for_job(&failing, JOB_TIMEOUT).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["error"].as_str().unwrap().contains("refused"));

    // The worker survives and keeps going.
    let (_, body) = client.wait_for_job(&fine, JOB_TIMEOUT).await.unwrap();
    assert_eq!(body["status"], "done");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_job_is_processing_until_a_worker_runs_it() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let client = ApiTestClient::new(addr);

    let id = client.submit("later").await.unwrap();
    let (status, body) = client.poll(&id).await.unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");

    let pool = start_workers(&ctx, ScriptedCompute::instant(), 1).unwrap();
    let (status, _) = client.wait_for_job(&id, JOB_TIMEOUT).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    pool.shutdown().await;
}

#[tokio::test]
async fn test_many_submissions_all_finish() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let pool = start_workers(&ctx, ScriptedCompute::new(Duration::from_millis(50)), 4).unwrap();
    let client = ApiTestClient::new(addr);

    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(client.submit("same prompt").await.unwrap());
    }
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());

    for id in &ids {
        let (_, body) = client.wait_for_job(id, JOB_TIMEOUT).await.unwrap();
        assert_eq!(body["status"], "done");
    }
    pool.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let ctx = TestContext::memory();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let client = ApiTestClient::new(addr);

    let (status, body) = client.poll("job_does-not-exist").await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");
}
