//! Passive data entities shared between the host store and the scan core.
//!
//! Nothing in here mutates anything: these are the records the `RunStore`
//! trait hands out and accepts back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a job (a build definition owning many runs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for one run (one execution of a job).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        RunId(id.into())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Completion outcome of a run, as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildOutcome {
    Success,
    Unstable,
    Failure,
    Aborted,
}

impl BuildOutcome {
    /// The host's "needs analysis" criterion: only failing or unstable
    /// outcomes qualify for failure-cause analysis. Aborted runs are
    /// explicitly excluded.
    pub fn needs_analysis(&self) -> bool {
        matches!(self, BuildOutcome::Failure | BuildOutcome::Unstable)
    }
}

/// Where a run sits in a matrix execution, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunKind {
    /// Ordinary single run.
    Standalone,
    /// Parent run of a matrix execution; owns child sub-runs.
    MatrixParent,
    /// One configuration axis of a matrix execution.
    MatrixChild { parent: RunId },
}

/// One execution of a job.
///
/// A matrix child carries its own execution `number`, which may differ from
/// its parent's when that configuration was not rebuilt in the latest
/// execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub job: JobId,
    /// Execution number, monotonic per job.
    pub number: u64,
    pub kind: RunKind,
    /// `None` while the run is still in progress.
    pub outcome: Option<BuildOutcome>,
}

impl RunRecord {
    /// Whether this run is a completed run that qualifies for analysis.
    pub fn eligible(&self) -> bool {
        self.outcome.map(|o| o.needs_analysis()).unwrap_or(false)
    }
}

/// One failure cause the matching engine recognized in a run's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedCause {
    /// Knowledge-base identifier of the cause.
    pub cause_id: String,
    /// Human-readable cause name (e.g. "Compile error").
    pub name: String,
    /// Knowledge-base categories the cause belongs to.
    pub categories: Vec<String>,
    /// Engine confidence in [0, 1].
    pub confidence: f64,
    /// Opaque engine payload (matched line, pattern, position). The core
    /// never inspects this.
    pub indication: serde_json::Value,
}

/// The output of running the matching engine against one run.
///
/// An empty `causes` list means the failure is unknown to the knowledge
/// base. Created only by a completed scan task; detached only by the
/// invalidator or by host-side run deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub run: RunId,
    pub causes: Vec<MatchedCause>,
    pub scanned_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn new(run: RunId, causes: Vec<MatchedCause>) -> Self {
        AnalysisResult {
            run,
            causes,
            scanned_at: Utc::now(),
        }
    }

    /// Whether the engine matched nothing (an "unknown failure").
    pub fn is_unknown(&self) -> bool {
        self.causes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_and_unstable_need_analysis() {
        assert!(BuildOutcome::Failure.needs_analysis());
        assert!(BuildOutcome::Unstable.needs_analysis());
        assert!(!BuildOutcome::Success.needs_analysis());
        assert!(!BuildOutcome::Aborted.needs_analysis());
    }

    #[test]
    fn incomplete_run_is_never_eligible() {
        let run = RunRecord {
            id: RunId::new("r1"),
            job: JobId::new("job"),
            number: 1,
            kind: RunKind::Standalone,
            outcome: None,
        };
        assert!(!run.eligible());
    }

    #[test]
    fn empty_causes_is_unknown_failure() {
        let result = AnalysisResult::new(RunId::new("r1"), vec![]);
        assert!(result.is_unknown());
    }
}
