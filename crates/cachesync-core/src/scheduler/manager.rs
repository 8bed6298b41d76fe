//! Fan a fixed task list out over the worker pool and aggregate progress.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use super::pool::WorkerPool;
use super::progress::{ProgressAggregator, ProgressObserver};
use super::task::{Task, TaskContext, TaskProgress, TaskState};
use crate::error::{SyncError, TaskError};

/// Pending result of one submitted task.
///
/// Resolves to [`TaskError::Cancelled`] when the task was discarded by
/// [`TaskManager::stop`] before it ran.
#[derive(Debug)]
pub struct TaskHandle<V> {
    index: usize,
    rx: mpsc::Receiver<Result<V, TaskError>>,
    taken: bool,
}

impl<V> TaskHandle<V> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Block until the task finished.
    pub fn wait(self) -> Result<V, TaskError> {
        if self.taken {
            return Err(TaskError::Taken { index: self.index });
        }
        self.rx
            .recv()
            .unwrap_or(Err(TaskError::Cancelled { index: self.index }))
    }

    /// Block for at most `timeout`. `None` means still pending, or that the
    /// result was already handed out by an earlier call.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<V, TaskError>> {
        if self.taken {
            return None;
        }
        let result = match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => return None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(TaskError::Cancelled { index: self.index })
            }
        };
        self.taken = true;
        Some(result)
    }
}

struct ManagedTask<T> {
    task: Arc<T>,
    progress: Arc<TaskProgress>,
}

/// Runs a fixed list of tasks on a fixed-size pool.
///
/// The list cannot change after construction. `start()` is meant to be called
/// once; calling it again re-submits the same tasks.
pub struct TaskManager<T: Task> {
    tasks: Vec<ManagedTask<T>>,
    aggregator: Arc<ProgressAggregator>,
    pool: WorkerPool,
}

impl<T: Task> TaskManager<T> {
    /// `workers` is taken as-is (0 is raised to 1); sizing policy belongs to
    /// the caller's configuration.
    pub fn new(
        tasks: Vec<T>,
        title: impl Into<String>,
        workers: usize,
        observer: Arc<dyn ProgressObserver>,
    ) -> io::Result<Self> {
        let aggregator = Arc::new(ProgressAggregator::new(title, tasks.len(), observer));
        let tasks = tasks
            .into_iter()
            .map(|task| ManagedTask {
                task: Arc::new(task),
                progress: Arc::new(TaskProgress::new()),
            })
            .collect();
        Ok(Self {
            tasks,
            aggregator,
            pool: WorkerPool::new(workers)?,
        })
    }

    pub fn title(&self) -> &str {
        self.aggregator.title()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Aggregated progress so far (sum of weighted task deltas).
    pub fn aggregated_progress(&self) -> f64 {
        self.aggregator.total()
    }

    pub fn task_state(&self, index: usize) -> Option<TaskState> {
        self.tasks.get(index).map(|t| t.progress.state())
    }

    /// Attach every task, then queue them in list order. Handles come back in
    /// the same order; completion order is unspecified.
    pub fn start(&self) -> Vec<TaskHandle<T::Output>> {
        for (index, managed) in self.tasks.iter().enumerate() {
            if !managed.progress.attach(Arc::clone(&self.aggregator)) {
                tracing::warn!(index, "start() called again; task is re-submitted");
            }
        }
        tracing::debug!(
            title = self.title(),
            tasks = self.tasks.len(),
            workers = self.pool.size(),
            "dispatching tasks"
        );

        self.tasks
            .iter()
            .enumerate()
            .map(|(index, managed)| {
                let (tx, rx) = mpsc::channel();
                let task = Arc::clone(&managed.task);
                let progress = Arc::clone(&managed.progress);
                let cancel = self.pool.cancel_token().clone();
                let queued = self.pool.submit(move || {
                    progress.set_state(TaskState::Running);
                    let ctx = TaskContext::new(index, Arc::clone(&progress), cancel.clone());
                    let result = panic::catch_unwind(AssertUnwindSafe(|| task.run(&ctx)));
                    progress.set_state(TaskState::Done);
                    let outcome = match result {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(error)) if cancel.is_cancelled() || is_cancellation(&error) => {
                            tracing::debug!(index, "task interrupted: {:#}", error);
                            Err(TaskError::Cancelled { index })
                        }
                        Ok(Err(error)) => Err(TaskError::Failed { index, error }),
                        Err(payload) => {
                            let message = panic_message(payload.as_ref());
                            tracing::error!(index, "task panicked: {}", message);
                            Err(TaskError::Panicked { index, message })
                        }
                    };
                    let _ = tx.send(outcome);
                });
                if !queued {
                    tracing::debug!(index, "pool stopped; task not queued");
                }
                TaskHandle {
                    index,
                    rx,
                    taken: false,
                }
            })
            .collect()
    }

    /// `start()`, then wait on each handle in list order. The first failure
    /// is returned as soon as its handle is reached; tasks behind it keep
    /// running.
    pub fn start_and_await(&self) -> Result<Vec<T::Output>, TaskError> {
        self.start().into_iter().map(TaskHandle::wait).collect()
    }

    /// Interrupt in-flight transfers and discard queued tasks. Does not wait.
    /// Anything the batch touched should be re-verified afterwards.
    pub fn stop(&self) {
        tracing::info!(title = self.title(), "stopping task manager");
        self.pool.stop();
    }

    /// Whether `stop()` has been called.
    pub fn is_stopped(&self) -> bool {
        self.pool.is_stopped()
    }
}

fn is_cancellation(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<SyncError>(), Some(e) if e.is_cancelled()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
