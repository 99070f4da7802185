//! Scan task execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use retroscan_store::{AnalysisResult, RunId, RunStore, StoreError};

use crate::matcher::FailureMatcher;

/// Lifecycle state of a scan task, as reported by the queue snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed { error: String },
    Cancelled,
}

impl TaskState {
    /// Whether this state ends the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Queued | TaskState::Running)
    }
}

/// One scheduled invocation of the matching engine against one run.
///
/// Immutable once built; owned by the queue from enqueue to terminal state.
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub run: RunId,
    pub task_id: Uuid,
    pub enqueued_at: DateTime<Utc>,
}

impl ScanTask {
    pub fn new(run: RunId) -> Self {
        ScanTask {
            run,
            task_id: Uuid::new_v4(),
            enqueued_at: Utc::now(),
        }
    }

    /// Run the matching engine against the target run and attach the result.
    ///
    /// Returns the terminal state:
    /// - `Cancelled` when the run was deleted while queued, or is no longer
    ///   a completed run (the host restarted it). No engine call is made.
    /// - `Failed` when the engine or the result attach fails; no partial
    ///   analysis is ever attached.
    /// - `Completed` with a fresh `AnalysisResult` attached to the run.
    ///
    /// Re-executing against unchanged run content yields the same causes,
    /// so invalidate-then-scan is idempotent.
    pub async fn execute(&self, store: &dyn RunStore, matcher: &dyn FailureMatcher) -> TaskState {
        let run = match store.run(&self.run).await {
            Ok(run) => run,
            Err(StoreError::RunNotFound { .. }) => {
                info!(run = %self.run, "run deleted while queued, discarding task");
                return TaskState::Cancelled;
            }
            Err(err) => {
                warn!(run = %self.run, error = %err, "store lookup failed, task failed");
                return TaskState::Failed {
                    error: err.to_string(),
                };
            }
        };

        if run.outcome.is_none() {
            info!(run = %self.run, "run no longer completed, discarding task");
            return TaskState::Cancelled;
        }

        let causes = match matcher.scan(&run).await {
            Ok(causes) => causes,
            Err(err) => {
                warn!(run = %self.run, error = %err, "matching engine failed");
                return TaskState::Failed {
                    error: err.to_string(),
                };
            }
        };

        let matched = causes.len();
        let result = AnalysisResult::new(self.run.clone(), causes);
        if let Err(err) = store.attach_analysis(&self.run, result).await {
            warn!(run = %self.run, error = %err, "failed to attach analysis");
            return TaskState::Failed {
                error: err.to_string(),
            };
        }

        info!(run = %self.run, matched, "scan completed");
        TaskState::Completed
    }
}
