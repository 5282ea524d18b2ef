//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode};
use promptgate_cache::CacheStatsSnapshot;
use promptgate_core::BackendReport;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub cache: CacheStatsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendReport>,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness plus counters. The status follows the backend's level when one
/// is reported.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backend = state.backend.as_ref().map(|b| b.report());
    let status = backend
        .as_ref()
        .map_or("healthy", |report| report.status.as_str());

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache: state.cache.stats(),
        backend,
    })
}

/// Ready once the shared store answers.
pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready".to_string(),
                error: None,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Store not reachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyResponse {
                    status: "unavailable".to_string(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
