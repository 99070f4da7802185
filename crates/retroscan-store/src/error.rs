//! Error types for the store abstraction layer.

use thiserror::Error;

/// Errors the host's run/job store can surface.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The run does not (or no longer does) exist.
    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// The job does not exist or its run list cannot be enumerated.
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// The store itself is unreachable or failed mid-operation.
    #[error("Run store unavailable: {0}")]
    Unavailable(String),
}
