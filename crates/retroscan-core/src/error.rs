//! Error types for the scheduling core.

use retroscan_store::{JobId, StoreError};
use thiserror::Error;

/// Errors surfaced to a trigger caller.
///
/// Per-run failures (a single engine error, a single failed invalidation)
/// are not errors at this level: they are isolated to their task or counted
/// in the trigger receipt. Only authorization and top-level store
/// unavailability fail the whole operation.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The actor lacks permission on the job. Surfaced before any queue
    /// interaction; no state is mutated.
    #[error("Actor `{actor}` is not permitted to scan job `{job}`")]
    Unauthorized { actor: String, job: JobId },

    /// The run store is unreachable; the whole trigger fails.
    #[error("Run store unavailable")]
    StoreUnavailable(#[source] StoreError),

    /// The queue has been shut down and accepts no further work.
    #[error("Scan queue is shut down")]
    QueueClosed,
}
