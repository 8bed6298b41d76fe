//! Keeping local cache files consistent with their remote sources.
//!
//! A [`SyncDescriptor`] names one remote/local pair and its expected digest, a
//! [`SyncUnit`] makes the verify/replace decision for it, and a [`SyncTask`]
//! runs that decision under the task manager.

mod descriptor;
mod locks;
mod task;
mod unit;

pub use descriptor::SyncDescriptor;
pub use locks::PathLockTable;
pub use task::{build_tasks, sync_all, SyncMode, SyncReport, SyncTask};
pub use unit::{Outcome, SyncUnit};
