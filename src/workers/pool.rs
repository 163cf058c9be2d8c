//! Bounded worker pool.
//!
//! # Responsibilities
//! - Run at most `capacity` tasks at any instant
//! - Queue everything else without blocking the submitter
//! - Drain or discard the queue on shutdown
//! - Report panicking tasks through the context's reporter
//!
//! # Design Decisions
//! - `capacity` executor tasks share one unbounded channel; an executor
//!   only takes the next task once its current one has finished
//! - Blocking jobs go to `spawn_blocking`, futures to `spawn`, so a panic
//!   surfaces as a `JoinError` instead of killing the executor
//! - Each task runs under the sink's tracing dispatch inside a `task`
//!   span carrying its `task_id`

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::instrument::WithSubscriber;
use tracing::Instrument;
use uuid::Uuid;

use crate::observability::metrics;
use crate::observability::{Fields, Level};
use crate::reporting::{Reporter, Severity};
use crate::workers::task::{Job, Task};

/// Errors from pool construction and submission.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool capacity must be at least 1")]
    ZeroCapacity,

    #[error("worker pool requires a running tokio runtime")]
    NoRuntime,

    #[error("worker pool is stopped")]
    Stopped,

    #[error("task did not run to completion")]
    TaskDropped,
}

/// State shared between the pool handle and its executors.
struct Shared {
    waiting: AtomicUsize,
    running: AtomicUsize,
    discard_queued: AtomicBool,
    /// Executors still running; reaches zero once the queue is closed
    /// and drained.
    live: watch::Sender<usize>,
    reporter: Reporter,
    dispatch: tracing::Dispatch,
}

/// A fixed number of executors fed from an unbounded queue.
pub struct WorkerPool {
    capacity: usize,
    sender: Mutex<Option<mpsc::UnboundedSender<Task>>>,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity)
            .field("waiting", &self.waiting_queue_size())
            .field("running", &self.running())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl WorkerPool {
    /// Start `capacity` executors on the current tokio runtime.
    pub fn new(capacity: usize, reporter: Reporter) -> Result<Self, PoolError> {
        let fields = Fields::from([("count".to_string(), Value::from(capacity))]);
        reporter
            .sink()
            .log(Level::Debug, "Configuring workers in pool", fields);

        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let handle = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let shared = Arc::new(Shared {
            waiting: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            discard_queued: AtomicBool::new(false),
            live: watch::Sender::new(capacity),
            dispatch: reporter.sink().dispatch(),
            reporter,
        });

        for _ in 0..capacity {
            handle.spawn(run_executor(Arc::clone(&rx), Arc::clone(&shared)));
        }

        Ok(Self {
            capacity,
            sender: Mutex::new(Some(tx)),
            shared,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks accepted but not yet started.
    pub fn waiting_queue_size(&self) -> usize {
        self.shared.waiting.load(Ordering::SeqCst)
    }

    /// Tasks currently executing.
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Queue blocking work. Returns immediately with the task's id.
    pub fn submit<F>(&self, f: F) -> Result<Uuid, PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Task::blocking(f))
    }

    /// Queue a future. Returns immediately with the task's id.
    pub fn submit_async<Fut>(&self, fut: Fut) -> Result<Uuid, PoolError>
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.enqueue(Task::future(fut.boxed()))
    }

    /// Queue blocking work and wait for it to finish.
    ///
    /// Fails with [`PoolError::TaskDropped`] if the task panicked or was
    /// discarded by [`WorkerPool::stop`].
    pub async fn submit_wait<F>(&self, f: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        self.submit(move || {
            f();
            let _ = done_tx.send(());
        })?;
        done_rx.await.map_err(|_| PoolError::TaskDropped)
    }

    fn enqueue(&self, task: Task) -> Result<Uuid, PoolError> {
        let id = task.id;
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::Stopped);
        };

        self.shared.waiting.fetch_add(1, Ordering::SeqCst);
        if sender.send(task).is_err() {
            self.shared.waiting.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Stopped);
        }
        metrics::record_task_submitted();
        metrics::set_waiting_tasks(self.waiting_queue_size());
        Ok(id)
    }

    /// Stop accepting work, run everything already queued, and wait for
    /// all executors to finish.
    pub async fn stop_wait(&self) {
        self.close();
        self.join_executors().await;
    }

    /// Stop accepting work, let running tasks finish, and drop whatever is
    /// still queued.
    pub async fn stop(&self) {
        self.shared.discard_queued.store(true, Ordering::SeqCst);
        self.close();
        self.join_executors().await;
    }

    fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    async fn join_executors(&self) {
        let mut live = self.shared.live.subscribe();
        // the sender lives in `shared`, so this only ends at zero
        let _ = live.wait_for(|count| *count == 0).await;
    }
}

/// Decrements the live executor count when an executor exits.
struct ExecutorGuard<'a>(&'a Shared);

impl Drop for ExecutorGuard<'_> {
    fn drop(&mut self) {
        self.0.live.send_modify(|count| *count -= 1);
    }
}

async fn run_executor(queue: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Task>>>, shared: Arc<Shared>) {
    let _guard = ExecutorGuard(&shared);
    loop {
        let next = queue.lock().await.recv().await;
        let Some(task) = next else {
            break;
        };
        shared.waiting.fetch_sub(1, Ordering::SeqCst);
        metrics::set_waiting_tasks(shared.waiting.load(Ordering::SeqCst));

        if shared.discard_queued.load(Ordering::SeqCst) {
            metrics::record_task_completed("discarded");
            continue;
        }

        let running = shared.running.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_running_tasks(running);

        run_task(task, &shared).await;

        let running = shared.running.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_running_tasks(running);
    }
}

async fn run_task(task: Task, shared: &Shared) {
    let dispatch = shared.dispatch.clone();
    let span = tracing::dispatcher::with_default(&dispatch, || {
        tracing::info_span!("task", task_id = %task.id)
    });

    let result = match task.job {
        Job::Blocking(f) => {
            tokio::task::spawn_blocking(move || {
                tracing::dispatcher::with_default(&dispatch, || span.in_scope(f))
            })
            .await
        }
        Job::Async(fut) => tokio::spawn(fut.instrument(span).with_subscriber(dispatch)).await,
    };

    match result {
        Ok(()) => metrics::record_task_completed("ok"),
        Err(e) => {
            metrics::record_task_completed("panicked");
            let fields = Fields::from([("task_id".to_string(), Value::from(task.id.to_string()))]);
            shared
                .reporter
                .report_with_fields(Some(&e), Severity::Error, "Worker task panicked", fields);
        }
    }
}
