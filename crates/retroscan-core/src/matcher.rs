//! Matching engine boundary.
//!
//! The knowledge-base lookup is a black box to the scheduling core: it is
//! handed a run and returns the causes it recognized. Its internal
//! algorithm, log access, and cause storage are all host concerns.

use async_trait::async_trait;
use retroscan_store::{MatchedCause, RunRecord};

/// Failure-cause matching engine.
///
/// `scan` may fail with a transient I/O error (engine unreachable, log gone)
/// or return an empty set when no known cause applies. Re-scanning a run
/// whose content has not changed must yield the same causes.
#[async_trait]
pub trait FailureMatcher: Send + Sync {
    async fn scan(&self, run: &RunRecord) -> anyhow::Result<Vec<MatchedCause>>;
}
