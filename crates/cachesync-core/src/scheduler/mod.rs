//! Task scheduling and progress aggregation.
//!
//! A [`TaskManager`] owns a fixed list of [`Task`]s and a fixed-size
//! [`WorkerPool`]. Each task reports absolute progress through its
//! [`TaskContext`]; the task's [`TaskProgress`] turns that into non-negative
//! deltas, and the manager folds every delta into one weighted total that is
//! forwarded to a [`ProgressObserver`].

mod manager;
mod pool;
mod progress;
mod task;

pub use manager::{TaskHandle, TaskManager};
pub use pool::WorkerPool;
pub use progress::{
    ChannelObserver, NoopObserver, ProgressAggregator, ProgressObserver, ProgressUpdate,
};
pub use task::{Task, TaskContext, TaskProgress, TaskState};
