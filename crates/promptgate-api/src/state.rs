//! Application state shared across handlers.

use promptgate_cache::ResponseCache;
use promptgate_core::ports::{BackendHealth, KeyValueStore, TaskQueue};
use std::sync::Arc;

/// Injected handles; the gateway keeps no other state.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ResponseCache>,
    pub queue: Arc<dyn TaskQueue>,
    pub store: Arc<dyn KeyValueStore>,
    /// Reported on `/health` when the backend keeps its own counters.
    pub backend: Option<Arc<dyn BackendHealth>>,
}

impl AppState {
    pub fn new(
        cache: Arc<ResponseCache>,
        queue: Arc<dyn TaskQueue>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            cache,
            queue,
            store,
            backend: None,
        }
    }

    pub fn with_backend_health(mut self, backend: Arc<dyn BackendHealth>) -> Self {
        self.backend = Some(backend);
        self
    }
}
