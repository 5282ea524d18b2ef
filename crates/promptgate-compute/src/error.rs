//! Compute client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Compute service returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("Compute service returned no text")]
    EmptyResponse,
    #[error("Compute provider not configured: {0}")]
    NotConfigured(String),
}

impl From<ComputeError> for promptgate_core::Error {
    fn from(err: ComputeError) -> Self {
        match err {
            ComputeError::NotConfigured(msg) => promptgate_core::Error::Configuration(msg),
            other => promptgate_core::Error::UpstreamCompute(other.to_string()),
        }
    }
}
