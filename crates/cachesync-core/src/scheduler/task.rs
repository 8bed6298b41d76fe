//! The task side of the progress protocol.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use super::progress::{AtomicF64, ProgressAggregator};
use crate::control::CancelToken;

/// One unit of work run on a single worker from start to finish.
///
/// Tasks are shared with the worker pool through an `Arc`, so `run` takes
/// `&self`; progress and cancellation arrive through the context.
pub trait Task: Send + Sync + 'static {
    type Output: Send + 'static;

    fn run(&self, ctx: &TaskContext) -> anyhow::Result<Self::Output>;
}

/// Lifecycle of a task's progress slot. Only moves forward: a task that is
/// re-submitted after finishing stays `Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// No parent manager yet; progress submitted now is orphaned.
    Unattached,
    /// Parent set, waiting in the pool queue.
    Attached,
    Running,
    Done,
}

impl TaskState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => TaskState::Unattached,
            1 => TaskState::Attached,
            2 => TaskState::Running,
            _ => TaskState::Done,
        }
    }
}

/// Per-task progress cursor.
///
/// Converts absolute progress reports into deltas against a high-water mark,
/// so re-submitting a value or going backwards never double-counts and never
/// subtracts from the parent's total.
#[derive(Debug)]
pub struct TaskProgress {
    state: AtomicU8,
    parent: OnceLock<Arc<ProgressAggregator>>,
    last: AtomicF64,
    orphaned: AtomicUsize,
}

impl Default for TaskProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskProgress {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Unattached as u8),
            parent: OnceLock::new(),
            last: AtomicF64::new(0.0),
            orphaned: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Attach the parent aggregator. Succeeds exactly once; later calls are
    /// ignored (logged) and return `false`.
    pub fn attach(&self, parent: Arc<ProgressAggregator>) -> bool {
        if self.parent.set(parent).is_err() {
            tracing::warn!("task progress already attached to a manager; ignoring re-attach");
            return false;
        }
        let _ = self.state.compare_exchange(
            TaskState::Unattached as u8,
            TaskState::Attached as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        true
    }

    /// Advance to `state`; never moves back to an earlier state.
    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.fetch_max(state as u8, Ordering::SeqCst);
    }

    /// Highest absolute progress seen so far.
    pub fn last_progress(&self) -> f64 {
        self.last.load()
    }

    /// Number of submissions made while no parent was attached.
    pub fn orphaned_submissions(&self) -> usize {
        self.orphaned.load(Ordering::SeqCst)
    }

    /// Report absolute progress in [0, 1]. Returns the delta forwarded to the
    /// parent (0.0 when nothing was forwarded).
    pub fn submit(&self, detail: &str, progress: f64) -> f64 {
        let Some(parent) = self.parent.get() else {
            self.orphaned.fetch_add(1, Ordering::SeqCst);
            tracing::warn!(
                detail,
                "progress submitted by a task with no parent manager; dropped"
            );
            return 0.0;
        };
        if progress.is_nan() {
            tracing::warn!(detail, "ignoring NaN progress");
            return 0.0;
        }
        let progress = progress.clamp(0.0, 1.0);
        let previous = self.last.fetch_max(progress);
        let delta = (progress - previous).max(0.0);
        parent.receive(detail, delta);
        delta
    }
}

/// What a running task sees of its manager.
#[derive(Debug, Clone)]
pub struct TaskContext {
    index: usize,
    progress: Arc<TaskProgress>,
    cancel: CancelToken,
}

impl TaskContext {
    pub fn new(index: usize, progress: Arc<TaskProgress>, cancel: CancelToken) -> Self {
        Self {
            index,
            progress,
            cancel,
        }
    }

    /// Position of this task in the manager's list.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn submit_progress(&self, detail: &str, progress: f64) {
        self.progress.submit(detail, progress);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}
