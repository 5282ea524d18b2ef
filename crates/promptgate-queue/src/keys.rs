//! Store keys for job data.
//!
//! Both prefixes are disjoint from the `chat.` cache namespace.

use promptgate_core::JobId;

pub const JOB_RECORD_PREFIX: &str = "job";
pub const JOB_RESULT_PREFIX: &str = "job-result";

/// Key of the job's state record.
pub fn job_record_key(id: JobId) -> String {
    format!("{}.{}", JOB_RECORD_PREFIX, id)
}

/// Key of the job's terminal result.
pub fn job_result_key(id: JobId) -> String {
    format!("{}.{}", JOB_RESULT_PREFIX, id)
}
