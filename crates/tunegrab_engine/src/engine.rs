use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tunegrab_core::{BatchSummary, ItemDescriptor, Status, TaskRecord};

use crate::adapter::{ConversionAdapter, ProgressSink};
use crate::filename::assign_stems;
use crate::observer::EngineObserver;
use crate::persist::{ensure_output_dir, PersistError};
use crate::{AdapterEvent, ConversionRequest};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Destination for converted files; created on `start` if missing.
    pub outdir: PathBuf,
    /// Upper bound on concurrently running conversions. Must be at least 1.
    pub max_workers: usize,
}

impl EngineConfig {
    pub const DEFAULT_MAX_WORKERS: usize = 4;

    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            outdir: outdir.into(),
            max_workers: Self::DEFAULT_MAX_WORKERS,
        }
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("max_workers must be at least 1, got {0}")]
    InvalidWorkers(usize),
    #[error(transparent)]
    OutputDir(#[from] PersistError),
    #[error("failed to start batch runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Runs batches of conversions on a bounded worker pool.
///
/// Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct DownloadEngine {
    shared: Arc<Shared>,
}

struct Shared {
    config: EngineConfig,
    adapter: Arc<dyn ConversionAdapter>,
    observer: Arc<dyn EngineObserver>,
    tasks: Mutex<Vec<TaskRecord>>,
    run: Mutex<RunState>,
}

#[derive(Default)]
struct RunState {
    cancel: CancellationToken,
    batch_thread: Option<JoinHandle<()>>,
}

struct Job {
    slot: usize,
    request: ConversionRequest,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DownloadEngine {
    pub fn new(
        config: EngineConfig,
        adapter: Arc<dyn ConversionAdapter>,
        observer: Arc<dyn EngineObserver>,
    ) -> Result<Self, EngineError> {
        if config.max_workers < 1 {
            return Err(EngineError::InvalidWorkers(config.max_workers));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                adapter,
                observer,
                tasks: Mutex::new(Vec::new()),
                run: Mutex::new(RunState::default()),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Starts a batch and returns without waiting for it.
    ///
    /// Entries whose id is in `skip_ids` are marked Skipped and reported
    /// before this returns. Repeated ids are dropped after their first
    /// occurrence. Callers must not start a new batch while one is running.
    pub fn start(
        &self,
        entries: &[ItemDescriptor],
        skip_ids: &HashSet<String>,
    ) -> Result<(), EngineError> {
        let config = &self.shared.config;
        ensure_output_dir(&config.outdir)?;

        let entries = dedupe_by_id(entries);
        let stems = assign_stems(&entries);
        let total = entries.len();

        // Concurrency is bounded by the worker count, not by runtime threads.
        let threads = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(config.max_workers);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("tunegrab-worker")
            .enable_all()
            .build()
            .map_err(EngineError::Runtime)?;

        let mut tasks: Vec<TaskRecord> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| TaskRecord::new(&e.url, &e.title, &e.id, i + 1, total))
            .collect();

        let cancel = CancellationToken::new();
        let previous = {
            let mut run = lock(&self.shared.run);
            run.cancel = cancel.clone();
            run.batch_thread.take()
        };
        if previous.is_some_and(|handle| !handle.is_finished()) {
            engine_warn!("start() called while a previous batch is still running");
        }
        *lock(&self.shared.tasks) = tasks.clone();

        let mut queue = VecDeque::new();
        for (slot, (task, stem)) in tasks.iter_mut().zip(stems).enumerate() {
            if skip_ids.contains(task.item_id()) {
                task.skip();
                self.shared.publish(slot, task);
                continue;
            }
            queue.push_back(Job {
                slot,
                request: ConversionRequest {
                    url: task.url().to_string(),
                    item_id: task.item_id().to_string(),
                    outdir: config.outdir.clone(),
                    stem,
                },
            });
        }

        engine_info!(
            "Starting batch: {} tasks, {} skipped, {} workers on {} threads, outdir {:?}",
            total,
            total - queue.len(),
            config.max_workers,
            threads,
            config.outdir
        );

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("tunegrab-batch".to_string())
            .spawn(move || {
                runtime.block_on(run_batch(Arc::clone(&shared), queue, cancel));
                drop(runtime);

                let snapshot = shared.snapshot();
                let summary = BatchSummary::from_tasks(&snapshot);
                engine_info!(
                    "Batch finished: {} completed, {} skipped, {} failed, {} cancelled",
                    summary.count(Status::Completed),
                    summary.count(Status::Skipped),
                    summary.count(Status::Failed),
                    summary.count(Status::Cancelled)
                );
                shared.observer.on_complete(snapshot);
            })
            .map_err(EngineError::Runtime)?;

        lock(&self.shared.run).batch_thread = Some(handle);
        Ok(())
    }

    /// Signals every worker to stop. Queued tasks become Cancelled without
    /// being started; running conversions stop at their next check point.
    pub fn cancel(&self) {
        let run = lock(&self.shared.run);
        if !run.cancel.is_cancelled() {
            engine_info!("Cancellation requested");
        }
        run.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.shared.run).cancel.is_cancelled()
    }

    /// Point-in-time copy of the current batch, in index order.
    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.shared.snapshot()
    }

    /// Blocks until the current batch (including `on_complete`) has finished.
    pub fn wait(&self) {
        let handle = lock(&self.shared.run).batch_thread.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                engine_error!("Batch thread panicked");
            }
        }
    }
}

impl Shared {
    fn snapshot(&self) -> Vec<TaskRecord> {
        lock(&self.tasks).clone()
    }

    fn task_at(&self, slot: usize) -> Option<TaskRecord> {
        lock(&self.tasks).get(slot).cloned()
    }

    /// Stores the new state of one task and notifies the observer.
    fn publish(&self, slot: usize, task: &TaskRecord) {
        if let Some(entry) = lock(&self.tasks).get_mut(slot) {
            *entry = task.clone();
        }
        self.observer.on_update(task);
    }

    /// Last-resort terminal state for a task whose worker died.
    fn abandon(&self, slot: usize, cancel: &CancellationToken, reason: &str) {
        let Some(mut task) = self.task_at(slot) else {
            return;
        };
        let changed = if cancel.is_cancelled() {
            task.cancel()
        } else {
            task.fail(reason)
        };
        if changed {
            self.publish(slot, &task);
        }
    }
}

fn dedupe_by_id(entries: &[ItemDescriptor]) -> Vec<ItemDescriptor> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| {
            let first = seen.insert(entry.id.as_str());
            if !first {
                engine_warn!("Dropping repeated item id {:?}", entry.id);
            }
            first
        })
        .cloned()
        .collect()
}

async fn run_batch(shared: Arc<Shared>, queue: VecDeque<Job>, cancel: CancellationToken) {
    let worker_count = shared.config.max_workers.min(queue.len());
    let slots: Vec<usize> = queue.iter().map(|job| job.slot).collect();
    let queue = Arc::new(Mutex::new(queue));

    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
        workers.spawn(worker_loop(
            worker_id,
            Arc::clone(&shared),
            Arc::clone(&queue),
            cancel.clone(),
        ));
    }
    while let Some(joined) = workers.join_next().await {
        if let Err(err) = joined {
            engine_error!("Worker ended abnormally: {}", err);
        }
    }

    // Anything still open here lost its worker; close it so on_complete sees
    // only terminal tasks.
    for slot in slots {
        shared.abandon(slot, &cancel, "worker stopped before finishing this task");
    }
}

async fn worker_loop(
    worker_id: usize,
    shared: Arc<Shared>,
    queue: Arc<Mutex<VecDeque<Job>>>,
    cancel: CancellationToken,
) {
    loop {
        let Some(job) = lock(&queue).pop_front() else {
            break;
        };
        let slot = job.slot;
        let outcome = AssertUnwindSafe(process_job(&shared, job, &cancel))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let reason = format!("internal error: {}", panic_message(panic.as_ref()));
            engine_error!("Worker {} panicked on task slot {}: {}", worker_id, slot, reason);
            shared.abandon(slot, &cancel, &reason);
        }
    }
    engine_debug!("Worker {} drained the queue", worker_id);
}

async fn process_job(shared: &Shared, job: Job, cancel: &CancellationToken) {
    let Some(task) = shared.task_at(job.slot) else {
        return;
    };
    let mut relay = TaskRelay {
        shared,
        slot: job.slot,
        task,
    };

    if cancel.is_cancelled() {
        relay.apply(TaskRecord::cancel);
        return;
    }

    relay.apply(TaskRecord::mark_downloading);
    let result = shared.adapter.convert(&job.request, &mut relay, cancel).await;
    match result {
        Ok(_) => {
            relay.apply(TaskRecord::complete);
        }
        Err(err) if err.is_interrupted() || cancel.is_cancelled() => {
            relay.apply(TaskRecord::cancel);
        }
        Err(err) => {
            engine_warn!(
                "Task {}/{} ({}) failed: {}",
                relay.task.index(),
                relay.task.total(),
                relay.task.item_id(),
                err
            );
            relay.apply(|task| task.fail(err.to_string()));
        }
    }
    engine_info!(
        "Task {}/{} {} -> {}",
        relay.task.index(),
        relay.task.total(),
        relay.task.item_id(),
        relay.task.status()
    );
}

/// The worker's private copy of one task. It is the only writer of that task;
/// every change is published to the shared snapshot and the observer.
struct TaskRelay<'a> {
    shared: &'a Shared,
    slot: usize,
    task: TaskRecord,
}

impl TaskRelay<'_> {
    fn apply(&mut self, change: impl FnOnce(&mut TaskRecord) -> bool) {
        if change(&mut self.task) {
            self.shared.publish(self.slot, &self.task);
        }
    }
}

impl ProgressSink for TaskRelay<'_> {
    fn emit(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::Downloading { downloaded, total } => {
                self.apply(|task| task.record_progress(downloaded, total))
            }
            AdapterEvent::FetchFinished => self.apply(TaskRecord::mark_converting),
            AdapterEvent::Retrying { .. } => self.apply(TaskRecord::record_attempt),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "panic".to_string()
    }
}
