//! Retroscan store layer
//!
//! Passive run/analysis data model plus the narrow host traits the
//! scheduling core depends on:
//! - `RunStore`: read access to a job's runs, attach/detach of analysis records
//! - `AuthGate`: permission check used by the web action layer
//!
//! All traits are async and host-agnostic. In-memory fakes are provided for
//! testing via the `fakes` module.

pub mod error;
pub mod fakes;
pub mod model;
pub mod store_traits;

pub use error::StoreError;
pub use model::{
    AnalysisResult, BuildOutcome, JobId, MatchedCause, RunId, RunKind, RunRecord,
};
pub use store_traits::{AuthGate, RunStore, StoreResult};
