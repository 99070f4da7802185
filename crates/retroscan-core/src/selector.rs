//! Run selection for scan triggers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use retroscan_store::{JobId, RunRecord, RunStore, StoreError};

use crate::error::ScanError;

/// Which runs of a job a trigger should cover. Supplied per invocation,
/// never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Eligible runs that have no attached analysis yet.
    #[default]
    NotYetScanned,
    /// Every eligible run, regardless of existing analyses (full re-scan).
    AllEligible,
}

/// Read-only selection of a job's runs eligible for scanning.
///
/// Eligibility is independent of policy: the run must be completed and its
/// outcome must qualify under the host's "needs analysis" criterion.
/// Selection never mutates run or analysis state.
pub struct BuildSelector {
    store: Arc<dyn RunStore>,
}

impl BuildSelector {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        BuildSelector { store }
    }

    /// Runs of `job` eligible under `policy`, in store order (newest first).
    ///
    /// An unknown job and a job with no eligible runs are both an empty
    /// sequence; only store unavailability propagates.
    pub async fn select(
        &self,
        job: &JobId,
        policy: SelectionPolicy,
    ) -> Result<Vec<RunRecord>, ScanError> {
        let runs = match self.store.runs_of_job(job).await {
            Ok(runs) => runs,
            Err(StoreError::JobNotFound { .. }) => {
                debug!(job = %job, "job unknown to store, selecting nothing");
                return Ok(Vec::new());
            }
            Err(err) => return Err(ScanError::StoreUnavailable(err)),
        };

        let mut selected = Vec::new();
        for run in runs {
            if !run.eligible() {
                continue;
            }
            if policy == SelectionPolicy::NotYetScanned {
                // A vanished run mid-iteration counts as "nothing attached";
                // the queue re-checks existence at dispatch anyway.
                match self.store.analysis(&run.id).await {
                    Ok(Some(_)) => continue,
                    Ok(None) | Err(StoreError::RunNotFound { .. }) => {}
                    Err(err) => return Err(ScanError::StoreUnavailable(err)),
                }
            }
            selected.push(run);
        }

        debug!(job = %job, ?policy, count = selected.len(), "selected runs for scanning");
        Ok(selected)
    }
}
