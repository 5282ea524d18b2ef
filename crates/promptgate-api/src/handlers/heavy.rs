//! Slow path: queued jobs and status polling.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use promptgate_core::JobPayload;
use promptgate_queue::{JobStatus, poll_job};
use promptgate_trace::TraceContext;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::PromptRequest;
use super::error::ApiError;
use crate::state::AppState;

const PROMPT_REQUIRED: &str = "Prompt is required for the heavy task.";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub message: String,
    #[serde(rename = "jobId")]
    pub job_id: String,
}

/// Body for jobs that have no result yet.
#[derive(Debug, Serialize)]
pub struct PollResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn submit_heavy(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "Rejected heavy request body");
        ApiError::bad_request(PROMPT_REQUIRED)
    })?;
    let prompt = request
        .prompt()
        .ok_or_else(|| ApiError::bad_request(PROMPT_REQUIRED))?;

    let trace_context = headers
        .get("traceparent")
        .and_then(|v| v.to_str().ok())
        .and_then(TraceContext::from_traceparent)
        .unwrap_or_else(TraceContext::generate);

    let job_id = state
        .queue
        .enqueue(JobPayload::new(prompt), Some(trace_context.to_traceparent()))
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to enqueue heavy task");
            ApiError::internal("Could not queue the task.")
        })?;

    info!(job_id = %job_id, trace_id = %trace_context.trace_id, "Heavy task accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            message: "Task accepted for processing.".to_string(),
            job_id: job_id.to_string(),
        }),
    ))
}

pub async fn poll_heavy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let status = poll_job(state.store.as_ref(), state.queue.as_ref(), &id)
        .await
        .map_err(|e| {
            error!(job_id = %id, error = %e, "Failed to fetch job status");
            ApiError::internal("Could not fetch job status.")
        })?;

    let response = match status {
        JobStatus::Finished(result) => (StatusCode::OK, Json(result)).into_response(),
        JobStatus::Pending(_) => (
            StatusCode::ACCEPTED,
            Json(PollResponse {
                status: "processing",
                message: "Job is still being processed.",
            }),
        )
            .into_response(),
        JobStatus::NotFound => (
            StatusCode::NOT_FOUND,
            Json(PollResponse {
                status: "not_found",
                message: "Job not found.",
            }),
        )
            .into_response(),
    };
    Ok(response)
}
