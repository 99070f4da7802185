//! In-memory fakes for the host traits (testing only)
//!
//! Provides `MemoryRunStore`, `AllowAllGate`, and `DenyAllGate` that satisfy
//! the trait contracts without any external dependencies. `MemoryRunStore`
//! additionally exposes fault-injection hooks so callers can exercise the
//! store-failure paths of the scheduling core.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{AnalysisResult, JobId, RunId, RunKind, RunRecord};
use crate::store_traits::{AuthGate, RunStore, StoreResult};

// ---------------------------------------------------------------------------
// MemoryRunStore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredRun {
    record: RunRecord,
    analysis: Option<AnalysisResult>,
}

/// In-memory run store backed by a `HashMap<RunId, StoredRun>`.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    jobs: Mutex<HashSet<String>>,
    runs: Mutex<HashMap<String, StoredRun>>,
    /// When set, every operation fails with `StoreError::Unavailable`.
    unavailable: Mutex<bool>,
    /// Run ids whose `detach_analysis` should fail (invalidation fault).
    fail_detach: Mutex<HashSet<String>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job so it can be enumerated even with zero runs.
    pub fn register_job(&self, job: &JobId) {
        self.jobs.lock().unwrap().insert(job.0.clone());
    }

    /// Seed a run. Replaces any run with the same id and registers its job.
    pub fn insert_run(&self, record: RunRecord) {
        self.register_job(&record.job);
        let mut runs = self.runs.lock().unwrap();
        runs.insert(
            record.id.0.clone(),
            StoredRun {
                record,
                analysis: None,
            },
        );
    }

    /// Seed a run that already carries an analysis record.
    pub fn insert_run_with_analysis(&self, record: RunRecord, analysis: AnalysisResult) {
        self.register_job(&record.job);
        let mut runs = self.runs.lock().unwrap();
        runs.insert(
            record.id.0.clone(),
            StoredRun {
                record,
                analysis: Some(analysis),
            },
        );
    }

    /// Simulate host-side deletion of a run.
    pub fn delete_run(&self, id: &RunId) {
        let mut runs = self.runs.lock().unwrap();
        runs.remove(&id.0);
    }

    /// Toggle whole-store unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    /// Make `detach_analysis` fail for one specific run.
    pub fn fail_detach_on(&self, id: &RunId) {
        self.fail_detach.lock().unwrap().insert(id.0.clone());
    }

    fn check_available(&self) -> StoreResult<()> {
        if *self.unavailable.lock().unwrap() {
            debug!("memory store marked unavailable, failing operation");
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn runs_of_job(&self, job: &JobId) -> StoreResult<Vec<RunRecord>> {
        self.check_available()?;
        if !self.jobs.lock().unwrap().contains(&job.0) {
            return Err(StoreError::JobNotFound {
                job_id: job.0.clone(),
            });
        }
        let runs = self.runs.lock().unwrap();
        let mut records: Vec<RunRecord> = runs
            .values()
            .filter(|s| s.record.job == *job && !matches!(s.record.kind, RunKind::MatrixChild { .. }))
            .map(|s| s.record.clone())
            .collect();
        // Newest first.
        records.sort_by(|a, b| b.number.cmp(&a.number));
        Ok(records)
    }

    async fn run(&self, id: &RunId) -> StoreResult<RunRecord> {
        self.check_available()?;
        let runs = self.runs.lock().unwrap();
        runs.get(&id.0)
            .map(|s| s.record.clone())
            .ok_or_else(|| StoreError::RunNotFound {
                run_id: id.0.clone(),
            })
    }

    async fn matrix_children(&self, parent: &RunId) -> StoreResult<Vec<RunRecord>> {
        self.check_available()?;
        let runs = self.runs.lock().unwrap();
        let mut children: Vec<RunRecord> = runs
            .values()
            .filter(|s| matches!(&s.record.kind, RunKind::MatrixChild { parent: p } if p == parent))
            .map(|s| s.record.clone())
            .collect();
        children.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(children)
    }

    async fn analysis(&self, id: &RunId) -> StoreResult<Option<AnalysisResult>> {
        self.check_available()?;
        let runs = self.runs.lock().unwrap();
        let stored = runs.get(&id.0).ok_or_else(|| StoreError::RunNotFound {
            run_id: id.0.clone(),
        })?;
        Ok(stored.analysis.clone())
    }

    async fn attach_analysis(&self, id: &RunId, result: AnalysisResult) -> StoreResult<()> {
        self.check_available()?;
        let mut runs = self.runs.lock().unwrap();
        let stored = runs.get_mut(&id.0).ok_or_else(|| StoreError::RunNotFound {
            run_id: id.0.clone(),
        })?;
        stored.analysis = Some(result);
        Ok(())
    }

    async fn detach_analysis(&self, id: &RunId) -> StoreResult<()> {
        self.check_available()?;
        if self.fail_detach.lock().unwrap().contains(&id.0) {
            return Err(StoreError::Unavailable(format!(
                "injected detach failure for {}",
                id
            )));
        }
        let mut runs = self.runs.lock().unwrap();
        let stored = runs.get_mut(&id.0).ok_or_else(|| StoreError::RunNotFound {
            run_id: id.0.clone(),
        })?;
        stored.analysis = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Auth gates
// ---------------------------------------------------------------------------

/// Gate that authorizes every actor.
#[derive(Debug, Default)]
pub struct AllowAllGate;

#[async_trait]
impl AuthGate for AllowAllGate {
    async fn is_authorized(&self, _actor: &str, _job: &JobId) -> bool {
        true
    }
}

/// Gate that denies every actor.
#[derive(Debug, Default)]
pub struct DenyAllGate;

#[async_trait]
impl AuthGate for DenyAllGate {
    async fn is_authorized(&self, _actor: &str, _job: &JobId) -> bool {
        false
    }
}
