//! Job types.
//!
//! A job moves through an explicit state machine persisted in a [`JobRecord`]:
//!
//! ```text
//! Queued -> Processing -> Done
//!                      \-> Failed
//! ```
//!
//! `Processing -> Processing` happens on lease renewal and when an expired
//! lease is picked up by another worker. Terminal states never change.

use crate::error::{Error, Result};
use crate::ids::{JobId, WorkerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The submitted request of a heavy job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub prompt: String,
}

impl JobPayload {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub submitted_at: DateTime<Utc>,
    /// W3C `traceparent` of the request that submitted the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<String>,
}

impl Job {
    pub fn new(payload: JobPayload) -> Self {
        Self {
            id: JobId::new(),
            payload,
            submitted_at: Utc::now(),
            trace_context: None,
        }
    }

    pub fn with_trace_context(mut self, traceparent: Option<String>) -> Self {
        self.trace_context = traceparent;
        self
    }
}

/// Observable state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing {
        worker_id: WorkerId,
        attempt: u32,
        lease_expires_at: DateTime<Utc>,
    },
    Done {
        result: String,
    },
    Failed {
        error: String,
    },
    /// No record exists for the id.
    Unknown,
}

impl JobState {
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing { .. } => "processing",
            JobState::Done { .. } => "done",
            JobState::Failed { .. } => "failed",
            JobState::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::Failed { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Processing { .. })
    }

    /// The terminal outcome, if any.
    pub fn outcome(&self) -> Option<JobResult> {
        match self {
            JobState::Done { result } => Some(JobResult::Done {
                result: result.clone(),
            }),
            JobState::Failed { error } => Some(JobResult::Failed {
                error: error.clone(),
            }),
            _ => None,
        }
    }
}

/// Terminal outcome written by a worker.
///
/// Serializes as `{"status":"done","result":…}` or `{"status":"failed","error":…}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Done { result: String },
    Failed { error: String },
}

impl JobResult {
    pub fn done(result: impl Into<String>) -> Self {
        JobResult::Done {
            result: result.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        JobResult::Failed {
            error: error.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobResult::Failed { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            JobResult::Done { .. } => "done",
            JobResult::Failed { .. } => "failed",
        }
    }
}

impl From<&JobResult> for JobState {
    fn from(result: &JobResult) -> Self {
        match result {
            JobResult::Done { result } => JobState::Done {
                result: result.clone(),
            },
            JobResult::Failed { error } => JobState::Failed {
                error: error.clone(),
            },
        }
    }
}

/// Persisted job metadata: the job itself and its current state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: Job,
    #[serde(flatten)]
    pub state: JobState,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(job: Job) -> Self {
        Self {
            job,
            state: JobState::Queued,
            updated_at: Utc::now(),
        }
    }

    /// Hand the job to a worker. Allowed from `Queued` and from `Processing`
    /// (redelivery after a lease expired).
    pub fn start(
        &mut self,
        worker_id: WorkerId,
        attempt: u32,
        lease_expires_at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.state.is_pending() {
            return Err(self.transition_error("processing"));
        }
        self.state = JobState::Processing {
            worker_id,
            attempt,
            lease_expires_at,
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Extend the lease held by `worker_id`.
    pub fn renew(&mut self, worker_id: WorkerId, lease_expires_at: DateTime<Utc>) -> Result<()> {
        let held = matches!(
            &self.state,
            JobState::Processing { worker_id: holder, .. } if *holder == worker_id
        );
        if !held {
            return Err(self.transition_error("processing"));
        }
        if let JobState::Processing {
            lease_expires_at: expires,
            ..
        } = &mut self.state
        {
            *expires = lease_expires_at;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the terminal outcome.
    pub fn finish(&mut self, result: &JobResult) -> Result<()> {
        if self.state.is_terminal() {
            return Err(self.transition_error(result.status()));
        }
        self.state = JobState::from(result);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn transition_error(&self, to: &'static str) -> Error {
        Error::InvalidTransition {
            job_id: self.job.id.to_string(),
            from: self.state.name(),
            to,
        }
    }
}

/// A job handed to a worker under a lease.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub job: Job,
    pub worker_id: WorkerId,
    /// Delivery count, starting at 1.
    pub attempt: u32,
    pub lease_expires_at: DateTime<Utc>,
}

impl Claim {
    pub fn job_id(&self) -> JobId {
        self.job.id
    }
}
