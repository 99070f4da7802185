//! Host-facing trait definitions.
//!
//! The scheduling core has zero compile-time dependency on the host's object
//! graph: everything it needs from the host comes through these two traits.
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{AnalysisResult, JobId, RunId, RunRecord};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ---------------------------------------------------------------------------
// RunStore — read access to runs, read/write access to analysis records
// ---------------------------------------------------------------------------

/// Run/job store owned by the host environment.
///
/// Guarantees:
/// - `runs_of_job` returns runs newest-first.
/// - `attach_analysis` atomically replaces any existing record for that run
///   (a run holds at most one top-level analysis).
/// - `detach_analysis` is an idempotent no-op when no record is attached.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// All runs of a job, newest first. `JobNotFound` if the job is unknown.
    async fn runs_of_job(&self, job: &JobId) -> StoreResult<Vec<RunRecord>>;

    /// Look up one run by id.
    async fn run(&self, id: &RunId) -> StoreResult<RunRecord>;

    /// Child sub-runs of a matrix parent, across all execution numbers.
    /// Empty for a run that is not a matrix parent.
    async fn matrix_children(&self, parent: &RunId) -> StoreResult<Vec<RunRecord>>;

    /// The analysis currently attached to a run, if any.
    async fn analysis(&self, id: &RunId) -> StoreResult<Option<AnalysisResult>>;

    /// Attach an analysis record, replacing any existing one atomically.
    async fn attach_analysis(&self, id: &RunId, result: AnalysisResult) -> StoreResult<()>;

    /// Detach the analysis record. No-op if none is attached.
    async fn detach_analysis(&self, id: &RunId) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// AuthGate — permission check for the web action layer
// ---------------------------------------------------------------------------

/// Permission gate consulted by the web action layer before it forwards a
/// trigger into the core. The core itself performs no authorization logic.
#[async_trait]
pub trait AuthGate: Send + Sync {
    /// Whether `actor` may trigger a scan on `job`.
    async fn is_authorized(&self, actor: &str, job: &JobId) -> bool;
}
