//! End-to-end flows against a real NATS server.
//!
//! Run with: `cargo test -p promptgate-tests --test nats_flow_tests --features integration`

#![cfg(feature = "integration")]

use promptgate_core::WorkerId;
use promptgate_tests::{
    ApiTestClient, ScriptedCompute, TestContext, context::TEST_LEASE, start_test_server,
    start_workers,
};
use reqwest::StatusCode;
use std::time::Duration;

const JOB_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::test]
async fn test_ready_against_nats() {
    let ctx = TestContext::nats().await.expect("Failed to create context");
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .expect("Failed to start server");

    let client = ApiTestClient::new(addr);
    assert!(client.ready().await.unwrap());
}

#[tokio::test]
async fn test_cache_is_shared_between_gateways() {
    let ctx = TestContext::nats().await.unwrap();
    let compute = ScriptedCompute::instant();
    let (addr_a, _a) = start_test_server(&ctx, compute.clone()).await.unwrap();
    let (addr_b, _b) = start_test_server(&ctx, compute.clone()).await.unwrap();

    let (_, first) = ApiTestClient::new(addr_a).chat("shared").await.unwrap();
    let (status, second) = ApiTestClient::new(addr_b).chat("shared").await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["source"], "api");
    assert_eq!(second["source"], "cache");
    assert_eq!(compute.calls(), 1);
}

#[tokio::test]
async fn test_heavy_job_round_trip() {
    let ctx = TestContext::nats().await.unwrap();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let pool = start_workers(&ctx, ScriptedCompute::new(Duration::from_millis(500)), 2).unwrap();
    let client = ApiTestClient::new(addr);

    let id = client.submit("summarize the archive").await.unwrap();
    let (status, body) = client.wait_for_job(&id, JOB_TIMEOUT).await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "done");
    assert_eq!(body["result"], ScriptedCompute::answer("summarize the archive"));
    pool.shutdown().await;
}

#[tokio::test]
async fn test_job_outlives_a_dead_worker() {
    let ctx = TestContext::nats().await.unwrap();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();
    let client = ApiTestClient::new(addr);
    let id = client.submit("crash me once").await.unwrap();

    // A worker claims the job and dies without acknowledging it.
    let crashed = ctx.second_queue().await.unwrap();
    let claim = crashed
        .claim(WorkerId::new(), TEST_LEASE, Duration::from_secs(5))
        .await
        .unwrap()
        .expect("the submitted job");
    assert_eq!(claim.job_id().to_string(), id);
    drop(crashed);

    let (status, _) = client.poll(&id).await.unwrap();
    assert_eq!(status, StatusCode::ACCEPTED);

    // Once the lease lapses another worker picks it up.
    let pool = start_workers(&ctx, ScriptedCompute::instant(), 1).unwrap();
    let (status, body) = client.wait_for_job(&id, JOB_TIMEOUT).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "done");
    pool.shutdown().await;
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let ctx = TestContext::nats().await.unwrap();
    let (addr, _handle) = start_test_server(&ctx, ScriptedCompute::instant())
        .await
        .unwrap();

    let (status, body) = ApiTestClient::new(addr)
        .poll(&promptgate_core::JobId::new().to_string())
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "not_found");
}
