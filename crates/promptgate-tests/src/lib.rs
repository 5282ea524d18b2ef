//! Integration test infrastructure for promptgate.
//!
//! Tests run the real gateway on a local port against either the in-memory
//! adapters or a throwaway NATS server started with testcontainers.
//!
//! # Usage
//!
//! ```ignore
//! use promptgate_tests::TestContext;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ctx = TestContext::nats().await.unwrap();
//!     // Use ctx.store, ctx.queue, start_test_server(&ctx, ...), etc.
//! }
//! ```

pub mod containers;
pub mod context;
pub mod fixtures;
pub mod helpers;

pub use context::TestContext;
pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,promptgate_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
