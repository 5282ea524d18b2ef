//! Durable job tracking for promptgate.
//!
//! Job metadata is kept in a [`JobLedger`] on top of any
//! [`KeyValueStore`](promptgate_core::ports::KeyValueStore): one record per job
//! holding an explicit [`JobState`](promptgate_core::JobState), plus the
//! terminal [`JobResult`](promptgate_core::JobResult) under its own key.

pub mod keys;
pub mod ledger;
pub mod memory;
pub mod status;

pub use keys::{job_record_key, job_result_key};
pub use ledger::{JobLedger, lease_deadline, read_result, write_result};
pub use memory::MemoryTaskQueue;
pub use status::{JobStatus, poll_job};
