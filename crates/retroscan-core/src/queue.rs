//! Scan queue: FIFO dispatch with at-most-one in-flight task per run.
//!
//! One shared queue structure drained by a configurable pool of tokio
//! workers. All enqueue/dispatch decisions happen inside a single critical
//! section, so the per-run in-flight invariant holds even when two enqueue
//! calls race. Task execution itself happens outside the lock; a hung engine
//! call blocks only its worker.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use retroscan_store::{RunId, RunStore};

use crate::matcher::FailureMatcher;
use crate::task::{ScanTask, TaskState};

/// Worker pool sizing for the queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of concurrent workers draining the queue.
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { workers: 1 }
    }
}

/// What happened to an enqueue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Task accepted and queued for dispatch.
    Accepted,
    /// A task for the same run is already queued or running; the request
    /// was merged into it.
    Merged,
    /// The queue has been shut down.
    Closed,
}

struct QueueState {
    pending: VecDeque<ScanTask>,
    /// Runs currently `Queued` or `Running`.
    in_flight: HashMap<RunId, TaskState>,
    /// Last terminal outcome per run, overwritten on re-enqueue.
    finished: HashMap<RunId, TaskState>,
    closed: bool,
}

impl QueueState {
    fn settled(&self) -> bool {
        self.pending.is_empty() && self.in_flight.is_empty()
    }
}

struct QueueInner {
    store: Arc<dyn RunStore>,
    matcher: Arc<dyn FailureMatcher>,
    state: Mutex<QueueState>,
    /// Wakes an idle worker when work arrives or the queue closes.
    wake: Notify,
    /// Wakes `settled()` waiters when a task reaches a terminal state.
    settle_wake: Notify,
}

/// Asynchronous scan scheduler.
///
/// Per-run lifecycle: `Idle → Queued → Running → terminal → Idle`. A run
/// becomes re-enqueueable the moment its task goes terminal. The queue has
/// no capacity limit and never retries failed tasks; the operator
/// re-triggers. State is in-memory only: a process restart loses queued
/// work by design.
pub struct ScanQueue {
    inner: Arc<QueueInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ScanQueue {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn new(
        store: Arc<dyn RunStore>,
        matcher: Arc<dyn FailureMatcher>,
        config: QueueConfig,
    ) -> Self {
        let inner = Arc::new(QueueInner {
            store,
            matcher,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                in_flight: HashMap::new(),
                finished: HashMap::new(),
                closed: false,
            }),
            wake: Notify::new(),
            settle_wake: Notify::new(),
        });

        let worker_count = config.workers.max(1);
        let mut workers = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let inner = Arc::clone(&inner);
            workers.push(tokio::spawn(Self::worker_loop(inner, worker)));
        }
        info!(workers = worker_count, "scan queue started");

        ScanQueue {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Accept a task unless one is already in flight for the same run.
    ///
    /// Callable from sync or async contexts; never blocks on task
    /// execution.
    pub fn enqueue(&self, task: ScanTask) -> EnqueueOutcome {
        let outcome = {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                return EnqueueOutcome::Closed;
            }
            if state.in_flight.contains_key(&task.run) {
                debug!(run = %task.run, "scan already in flight, merging request");
                return EnqueueOutcome::Merged;
            }
            state.finished.remove(&task.run);
            state.in_flight.insert(task.run.clone(), TaskState::Queued);
            debug!(run = %task.run, task = %task.task_id, "task queued");
            state.pending.push_back(task);
            EnqueueOutcome::Accepted
        };
        self.inner.wake.notify_one();
        outcome
    }

    /// Snapshot of per-run task states: everything queued or running, plus
    /// the last terminal outcome of runs not since re-enqueued.
    pub fn status(&self) -> HashMap<RunId, TaskState> {
        let state = self.inner.state.lock().unwrap();
        let mut snapshot = state.in_flight.clone();
        for (run, terminal) in &state.finished {
            snapshot.entry(run.clone()).or_insert_with(|| terminal.clone());
        }
        snapshot
    }

    /// Wait until no task is queued or running.
    pub async fn settled(&self) {
        loop {
            let woken = self.inner.settle_wake.notified();
            tokio::pin!(woken);
            // Register for wakeups before checking, so a task finishing
            // between the check and the await is not missed.
            woken.as_mut().enable();
            if self.inner.state.lock().unwrap().settled() {
                return;
            }
            woken.await;
        }
    }

    /// Close the queue: pending tasks not yet claimed are recorded as
    /// `Cancelled`, workers finish their current task and exit.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.closed = true;
            while let Some(task) = state.pending.pop_front() {
                state.in_flight.remove(&task.run);
                state.finished.insert(task.run, TaskState::Cancelled);
            }
        }
        self.inner.wake.notify_waiters();

        let handles: Vec<JoinHandle<()>> = self.workers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
        self.inner.settle_wake.notify_waiters();
        info!("scan queue shut down");
    }

    async fn worker_loop(inner: Arc<QueueInner>, worker: usize) {
        loop {
            // Register for wakeups before inspecting the queue: a close or
            // enqueue landing between releasing the lock and parking would
            // otherwise be lost (`notify_waiters` stores no permit).
            let woken = inner.wake.notified();
            tokio::pin!(woken);
            woken.as_mut().enable();

            let next = {
                let mut state = inner.state.lock().unwrap();
                if state.closed {
                    break;
                }
                match state.pending.pop_front() {
                    Some(task) => {
                        state.in_flight.insert(task.run.clone(), TaskState::Running);
                        Some(task)
                    }
                    None => None,
                }
            };

            match next {
                Some(task) => {
                    debug!(worker, run = %task.run, "dispatching task");
                    let terminal = task
                        .execute(inner.store.as_ref(), inner.matcher.as_ref())
                        .await;
                    let mut state = inner.state.lock().unwrap();
                    state.in_flight.remove(&task.run);
                    state.finished.insert(task.run.clone(), terminal);
                    drop(state);
                    inner.settle_wake.notify_waiters();
                }
                None => woken.await,
            }
        }
        debug!(worker, "worker exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use retroscan_store::fakes::MemoryRunStore;
    use retroscan_store::{BuildOutcome, JobId, MatchedCause, RunKind, RunRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMatcher {
        calls: AtomicUsize,
    }

    impl CountingMatcher {
        fn new() -> Self {
            CountingMatcher {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FailureMatcher for CountingMatcher {
        async fn scan(&self, _run: &RunRecord) -> anyhow::Result<Vec<MatchedCause>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    /// Matcher that parks until released, so tests can hold a run in
    /// `Running` deterministically.
    struct GatedMatcher {
        started: Notify,
        release: tokio::sync::Semaphore,
        calls: AtomicUsize,
    }

    impl GatedMatcher {
        fn new() -> Self {
            GatedMatcher {
                started: Notify::new(),
                release: tokio::sync::Semaphore::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FailureMatcher for GatedMatcher {
        async fn scan(&self, _run: &RunRecord) -> anyhow::Result<Vec<MatchedCause>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            let permit = self.release.acquire().await?;
            permit.forget();
            Ok(vec![])
        }
    }

    fn seed_run(store: &MemoryRunStore, id: &str) -> RunId {
        store.insert_run(RunRecord {
            id: RunId::new(id),
            job: JobId::new("web"),
            number: 1,
            kind: RunKind::Standalone,
            outcome: Some(BuildOutcome::Failure),
        });
        RunId::new(id)
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_merged_while_running() {
        let store = Arc::new(MemoryRunStore::new());
        let r1 = seed_run(&store, "r1");
        let matcher = Arc::new(GatedMatcher::new());
        let queue = ScanQueue::new(
            Arc::clone(&store) as Arc<dyn RunStore>,
            Arc::clone(&matcher) as Arc<dyn FailureMatcher>,
            QueueConfig::default(),
        );

        assert_eq!(queue.enqueue(ScanTask::new(r1.clone())), EnqueueOutcome::Accepted);
        matcher.started.notified().await;
        assert_eq!(queue.status().get(&r1), Some(&TaskState::Running));

        // Second request for the same run while the first is running.
        assert_eq!(queue.enqueue(ScanTask::new(r1.clone())), EnqueueOutcome::Merged);

        matcher.release.add_permits(1);
        queue.settled().await;

        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(queue.status().get(&r1), Some(&TaskState::Completed));
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn run_is_reenqueueable_after_terminal_state() {
        let store = Arc::new(MemoryRunStore::new());
        let r1 = seed_run(&store, "r1");
        let matcher = Arc::new(CountingMatcher::new());
        let queue = ScanQueue::new(
            Arc::clone(&store) as Arc<dyn RunStore>,
            Arc::clone(&matcher) as Arc<dyn FailureMatcher>,
            QueueConfig::default(),
        );

        assert_eq!(queue.enqueue(ScanTask::new(r1.clone())), EnqueueOutcome::Accepted);
        queue.settled().await;
        assert_eq!(queue.enqueue(ScanTask::new(r1.clone())), EnqueueOutcome::Accepted);
        queue.settled().await;

        assert_eq!(matcher.calls.load(Ordering::SeqCst), 2);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn tasks_dispatch_in_arrival_order() {
        let store = Arc::new(MemoryRunStore::new());
        let matcher = Arc::new(GatedMatcher::new());
        let queue = ScanQueue::new(
            Arc::clone(&store) as Arc<dyn RunStore>,
            Arc::clone(&matcher) as Arc<dyn FailureMatcher>,
            QueueConfig { workers: 1 },
        );

        let first = seed_run(&store, "first");
        let second = seed_run(&store, "second");
        queue.enqueue(ScanTask::new(first.clone()));
        queue.enqueue(ScanTask::new(second.clone()));

        matcher.started.notified().await;
        // Single worker: first is running, second still queued behind it.
        let status = queue.status();
        assert_eq!(status.get(&first), Some(&TaskState::Running));
        assert_eq!(status.get(&second), Some(&TaskState::Queued));

        matcher.release.add_permits(2);
        queue.settled().await;
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_cancels_unclaimed_tasks_and_rejects_new_ones() {
        let store = Arc::new(MemoryRunStore::new());
        let matcher = Arc::new(GatedMatcher::new());
        let queue = ScanQueue::new(
            Arc::clone(&store) as Arc<dyn RunStore>,
            Arc::clone(&matcher) as Arc<dyn FailureMatcher>,
            QueueConfig { workers: 1 },
        );

        let running = seed_run(&store, "running");
        let waiting = seed_run(&store, "waiting");
        queue.enqueue(ScanTask::new(running.clone()));
        queue.enqueue(ScanTask::new(waiting.clone()));
        matcher.started.notified().await;

        // Let the in-flight task finish, then close.
        matcher.release.add_permits(1);
        queue.shutdown().await;

        let status = queue.status();
        assert_eq!(status.get(&running), Some(&TaskState::Completed));
        assert_eq!(status.get(&waiting), Some(&TaskState::Cancelled));
        assert_eq!(
            queue.enqueue(ScanTask::new(seed_run(&store, "late"))),
            EnqueueOutcome::Closed
        );
        // Cancelled task never reached the engine.
        assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    }

    /// Workers register for wakeups before inspecting the queue, so a close
    /// landing while a worker is between the empty-queue check and parking
    /// must still wake it. Cycled many times on a multi-threaded runtime to
    /// give preemption a chance to land in that window.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn shutdown_wakes_workers_parked_after_draining() {
        for _ in 0..50 {
            let store = Arc::new(MemoryRunStore::new());
            let matcher = Arc::new(CountingMatcher::new());
            let queue = ScanQueue::new(
                Arc::clone(&store) as Arc<dyn RunStore>,
                Arc::clone(&matcher) as Arc<dyn FailureMatcher>,
                QueueConfig { workers: 4 },
            );

            // One quick task so every worker cycles through the
            // empty-queue path while shutdown races them.
            queue.enqueue(ScanTask::new(seed_run(&store, "r1")));
            tokio::time::timeout(std::time::Duration::from_secs(5), queue.shutdown())
                .await
                .expect("shutdown must not hang on a parked worker");
        }
    }
}
