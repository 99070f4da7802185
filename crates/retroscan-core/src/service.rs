//! Trigger surface the web action layer forwards into.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use retroscan_store::{AuthGate, JobId, RunId, RunStore};

use crate::error::ScanError;
use crate::invalidator::ResultInvalidator;
use crate::matcher::FailureMatcher;
use crate::queue::{EnqueueOutcome, QueueConfig, ScanQueue};
use crate::selector::{BuildSelector, SelectionPolicy};
use crate::task::{ScanTask, TaskState};

/// Explicit wiring for the scan core: engine handle, store handle, policy
/// default, queue sizing. Passed into `ScanService::new`; there is no
/// process-wide configuration.
pub struct ScanContext {
    pub store: Arc<dyn RunStore>,
    pub matcher: Arc<dyn FailureMatcher>,
    pub default_policy: SelectionPolicy,
    pub queue: QueueConfig,
}

impl ScanContext {
    pub fn new(store: Arc<dyn RunStore>, matcher: Arc<dyn FailureMatcher>) -> Self {
        ScanContext {
            store,
            matcher,
            default_policy: SelectionPolicy::default(),
            queue: QueueConfig::default(),
        }
    }
}

/// What a trigger did, returned as soon as all tasks are accepted. Task
/// execution continues in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerReceipt {
    /// Runs the selector picked.
    pub selected: usize,
    /// Tasks accepted into the queue.
    pub accepted: usize,
    /// Requests merged into an already in-flight task.
    pub merged: usize,
    /// Runs skipped because their stale analysis could not be detached.
    pub invalidation_failures: usize,
}

/// Entry point for scan-on-demand triggers.
///
/// Owns the queue and its worker pool. Callers are expected to be already
/// authorized; `authorize` is the helper the web glue uses beforehand.
pub struct ScanService {
    selector: BuildSelector,
    invalidator: ResultInvalidator,
    queue: ScanQueue,
    default_policy: SelectionPolicy,
}

impl ScanService {
    /// Build the service and start its workers. Must be called from within
    /// a tokio runtime.
    pub fn new(ctx: ScanContext) -> Self {
        let queue = ScanQueue::new(Arc::clone(&ctx.store), Arc::clone(&ctx.matcher), ctx.queue);
        ScanService {
            selector: BuildSelector::new(Arc::clone(&ctx.store)),
            invalidator: ResultInvalidator::new(ctx.store),
            queue,
            default_policy: ctx.default_policy,
        }
    }

    /// Select runs under `policy` (or the context default), clean each one's
    /// stale analysis, and queue a scan task for it. Returns once every task
    /// is accepted; completion is not awaited.
    ///
    /// A run whose invalidation fails is skipped, counted in the receipt,
    /// and does not abort its siblings. Only store unavailability fails the
    /// whole trigger.
    pub async fn trigger_scan(
        &self,
        job: &JobId,
        policy: Option<SelectionPolicy>,
    ) -> Result<TriggerReceipt, ScanError> {
        let policy = policy.unwrap_or(self.default_policy);
        let runs = self.selector.select(job, policy).await?;

        let mut receipt = TriggerReceipt {
            selected: runs.len(),
            ..TriggerReceipt::default()
        };

        for run in runs {
            // Invalidate before enqueue, never concurrently: a task must not
            // start while its run's stale analysis is still being detached.
            if let Err(err) = self.invalidator.invalidate(&run).await {
                warn!(run = %run.id, error = %err, "invalidation failed, skipping run");
                receipt.invalidation_failures += 1;
                continue;
            }
            match self.queue.enqueue(ScanTask::new(run.id.clone())) {
                EnqueueOutcome::Accepted => receipt.accepted += 1,
                EnqueueOutcome::Merged => receipt.merged += 1,
                EnqueueOutcome::Closed => return Err(ScanError::QueueClosed),
            }
        }

        info!(
            job = %job,
            ?policy,
            selected = receipt.selected,
            accepted = receipt.accepted,
            merged = receipt.merged,
            invalidation_failures = receipt.invalidation_failures,
            "scan trigger accepted"
        );
        Ok(receipt)
    }

    /// Read-only snapshot of per-run task states.
    pub fn queue_status(&self) -> HashMap<RunId, TaskState> {
        self.queue.status()
    }

    /// Wait until the queue has no queued or running task. Intended for
    /// tests and orderly shutdown, not for trigger callers.
    pub async fn settled(&self) {
        self.queue.settled().await;
    }

    /// Stop accepting work and join the workers. Unclaimed tasks are
    /// recorded as cancelled.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

/// Check `actor` against the host's permission gate before touching the
/// queue. The web action layer calls this; the core performs no
/// authorization of its own.
pub async fn authorize(gate: &dyn AuthGate, actor: &str, job: &JobId) -> Result<(), ScanError> {
    if gate.is_authorized(actor, job).await {
        Ok(())
    } else {
        Err(ScanError::Unauthorized {
            actor: actor.to_string(),
            job: job.clone(),
        })
    }
}
