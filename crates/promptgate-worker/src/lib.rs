//! Background workers for promptgate.
//!
//! A [`WorkerPool`] runs independent loops that claim jobs from a
//! [`TaskQueue`](promptgate_core::ports::TaskQueue), execute them with the
//! [`JobExecutor`] and store each outcome under the job's result key.

pub mod config;
pub mod executor;
pub mod heartbeat;
pub mod pool;

pub use config::WorkerConfig;
pub use executor::{JobExecutor, JobOutcome};
pub use heartbeat::LeaseHeartbeat;
pub use pool::{WorkerPool, WorkerStatus};
