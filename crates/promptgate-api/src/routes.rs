//! API route definitions.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{chat, health, heavy};
use crate::middleware::{cors_layer, request_id, request_span};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

/// The router with request ids, request spans and CORS applied.
pub fn build_app(state: Arc<AppState>) -> Router {
    create_router(state)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(axum_middleware::from_fn(request_id))
        .layer(cors_layer())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/heavy", post(heavy::submit_heavy))
        .route("/heavy/{id}", get(heavy::poll_heavy))
}
