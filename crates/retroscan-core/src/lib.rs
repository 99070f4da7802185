//! Retroscan core - scan-on-demand scheduling
//!
//! Orchestrates *when* and *on what* the failure-cause matching engine is
//! invoked:
//! - Selects a job's runs that need (re-)analysis
//! - Detaches stale analysis records, matrix sub-runs included
//! - Queues scan tasks with at-most-one in flight per run
//! - Drains the queue asynchronously through a tokio worker pool
//!
//! The matching engine, run store, and permission gate are host concerns
//! reached only through the traits in `retroscan-store` and
//! [`matcher::FailureMatcher`].

pub mod downstream;
pub mod error;
pub mod invalidator;
pub mod matcher;
pub mod queue;
pub mod selector;
pub mod service;
pub mod task;

// Re-export key types
pub use downstream::{resolved_downstream, DownstreamBuildFinder, DownstreamLookup, LookupUnavailable};
pub use error::ScanError;
pub use invalidator::ResultInvalidator;
pub use matcher::FailureMatcher;
pub use queue::{EnqueueOutcome, QueueConfig, ScanQueue};
pub use selector::{BuildSelector, SelectionPolicy};
pub use service::{authorize, ScanContext, ScanService, TriggerReceipt};
pub use task::{ScanTask, TaskState};
