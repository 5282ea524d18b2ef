//! NATS JetStream backend for promptgate.
//!
//! [`NatsKvStore`] keeps cache entries and job records in a KV bucket;
//! [`NatsTaskQueue`] carries jobs on a work-queue stream consumed by a shared
//! durable pull consumer. Both come from a [`NatsBackend`] connection.

mod connection;
pub mod config;
pub mod health;
pub mod metrics;
mod queue;
mod store;

pub use config::NatsConfig;
pub use connection::NatsBackend;
pub use health::HealthCheck;
pub use metrics::{MetricsSnapshot, NatsMetrics};
pub use queue::NatsTaskQueue;
pub use store::NatsKvStore;
