//! Downstream-build lookup for pipeline/flow-style jobs.
//!
//! A one-shot helper outside the scheduling core: given the root run of a
//! flow, find the builds it triggered so they can be offered for scanning
//! too. Each lookup either yields the run or a typed `Unavailable` outcome;
//! callers decide whether to skip or propagate.

use async_trait::async_trait;
use tracing::warn;

use retroscan_store::RunRecord;

/// Why a downstream build could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupUnavailable {
    /// The downstream execution was cancelled before producing a build.
    Cancelled,
    /// Resolution was interrupted.
    Interrupted,
    /// Resolution failed outright.
    Failed(String),
}

impl std::fmt::Display for LookupUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupUnavailable::Cancelled => write!(f, "cancelled"),
            LookupUnavailable::Interrupted => write!(f, "interrupted"),
            LookupUnavailable::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Outcome of resolving one vertex of the downstream graph.
#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamLookup {
    Found(RunRecord),
    Unavailable(LookupUnavailable),
}

/// Host-side traversal of a flow run's downstream graph.
///
/// Implementations may include the root run itself among the results;
/// `resolved_downstream` filters it out by identity.
#[async_trait]
pub trait DownstreamBuildFinder: Send + Sync {
    async fn downstream_builds(&self, root: &RunRecord) -> Vec<DownstreamLookup>;
}

/// Resolve the downstream builds of `root`, skipping unavailable entries
/// (logged) and excluding the root run itself.
///
/// The root is excluded by id comparison, not by position: the graph
/// traversal makes no guarantee that the root is the first vertex returned.
pub async fn resolved_downstream(
    finder: &dyn DownstreamBuildFinder,
    root: &RunRecord,
) -> Vec<RunRecord> {
    let mut resolved = Vec::new();
    for lookup in finder.downstream_builds(root).await {
        match lookup {
            DownstreamLookup::Found(run) => {
                if run.id != root.id {
                    resolved.push(run);
                }
            }
            DownstreamLookup::Unavailable(reason) => {
                warn!(root = %root.id, %reason, "skipping unresolvable downstream build");
            }
        }
    }
    resolved
}
