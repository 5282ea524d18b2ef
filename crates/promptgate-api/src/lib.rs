//! HTTP gateway for promptgate.
//!
//! Two paths share one router: `/api/chat` answers through the response
//! cache, `/api/heavy` hands prompts to the task queue and lets clients poll.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use routes::{build_app, create_router};
pub use state::AppState;
