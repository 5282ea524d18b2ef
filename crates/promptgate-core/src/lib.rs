//! promptgate core
//!
//! Domain types, port traits, and error handling shared by every promptgate
//! crate. Adapters (in-memory, NATS, HTTP compute) live in their own crates and
//! plug into the traits defined in [`ports`].

pub mod error;
pub mod health;
pub mod ids;
pub mod job;
pub mod ports;

pub use error::{Error, Result};
pub use health::{BackendReport, HealthLevel};
pub use ids::*;
pub use job::{Claim, Job, JobPayload, JobRecord, JobResult, JobState};
