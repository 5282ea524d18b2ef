//! Fast path: cached chat responses.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use promptgate_cache::{CachedResponse, cache_key};
use promptgate_core::Error;
use promptgate_trace::cache_span;
use std::sync::Arc;
use tracing::{Instrument, error, warn};

use super::PromptRequest;
use super::error::ApiError;
use crate::state::AppState;

const PROMPT_REQUIRED: &str = "Prompt is required";
const COMPUTE_FAILED: &str = "Failed to fetch response from the compute service.";
const STORE_FAILED: &str = "The response cache is unavailable.";

pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<CachedResponse>, ApiError> {
    let Json(request) = body.map_err(|e| {
        warn!(error = %e, "Rejected chat request body");
        ApiError::bad_request(PROMPT_REQUIRED)
    })?;
    let prompt = request
        .prompt()
        .ok_or_else(|| ApiError::bad_request(PROMPT_REQUIRED))?;

    let span = cache_span("respond", &cache_key(prompt));
    match state.cache.respond(prompt).instrument(span).await {
        Ok(response) => Ok(Json(response)),
        Err(Error::Validation(message)) => Err(ApiError::bad_request(message)),
        Err(e) if e.is_store_unavailable() => {
            error!(error = %e, "Cache store unavailable");
            Err(ApiError::internal(STORE_FAILED))
        }
        Err(e) => {
            error!(error = %e, "Chat request failed");
            Err(ApiError::internal(COMPUTE_FAILED))
        }
    }
}
