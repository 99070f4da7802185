//! Stale-analysis cleanup ahead of a re-scan.

use std::sync::Arc;

use tracing::debug;

use retroscan_store::{RunKind, RunRecord, RunStore, StoreResult};

/// Detaches previously attached analysis records so a re-scan starts from a
/// clean slate.
///
/// For a matrix parent this also cleans the child sub-runs that belong to
/// the same execution number. Children carrying a different number belong to
/// an older configuration run and are left untouched.
pub struct ResultInvalidator {
    store: Arc<dyn RunStore>,
}

impl ResultInvalidator {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        ResultInvalidator { store }
    }

    /// Remove the analysis attached to `run`, and for a matrix parent the
    /// analyses of its same-numbered children. Idempotent: a run with
    /// nothing attached is a no-op.
    ///
    /// Must complete before the corresponding scan task starts executing;
    /// the trigger surface guarantees that ordering.
    pub async fn invalidate(&self, run: &RunRecord) -> StoreResult<()> {
        self.store.detach_analysis(&run.id).await?;

        if run.kind == RunKind::MatrixParent {
            for child in self.store.matrix_children(&run.id).await? {
                if child.number == run.number {
                    self.store.detach_analysis(&child.id).await?;
                    debug!(parent = %run.id, child = %child.id, "detached matrix child analysis");
                }
            }
        }

        Ok(())
    }
}
