//! Sync units as scheduler tasks.

use std::io;
use std::path::Path;
use std::sync::Arc;

use super::descriptor::SyncDescriptor;
use super::unit::{Outcome, SyncUnit};
use crate::error::TaskError;
use crate::fetch::{CurlFetcher, Fetch, TransferWatch};
use crate::scheduler::{ProgressObserver, Task, TaskContext, TaskHandle, TaskManager};

/// Progress reported once the local check is done and a fetch starts.
const FETCH_START: f64 = 0.1;
/// Progress reported when the transfer finished, before re-verification.
const FETCH_END: f64 = 0.9;

/// What a [`SyncTask`] does with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// `ensure_synced`: fetch when invalid.
    Ensure,
    /// `verify_with_optional_replace`.
    Verify { replace: bool },
}

/// Per-file result of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReport {
    Ensured { changed: bool },
    Verified(Outcome),
}

#[derive(Debug)]
pub struct SyncTask {
    unit: SyncUnit,
    mode: SyncMode,
}

impl SyncTask {
    pub fn new(unit: SyncUnit, mode: SyncMode) -> Self {
        Self { unit, mode }
    }

    pub fn unit(&self) -> &SyncUnit {
        &self.unit
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }
}

impl Task for SyncTask {
    type Output = SyncReport;

    fn run(&self, ctx: &TaskContext) -> anyhow::Result<SyncReport> {
        let descriptor = self.unit.descriptor();
        let name = descriptor.local_file_name();
        ctx.submit_progress(&format!("Checking {}", name), 0.0);

        let fetching = format!("Downloading {}", name);
        let on_progress = |done: u64, total: Option<u64>| {
            let fraction = match total {
                Some(total) if total > 0 => (done as f64 / total as f64).min(1.0),
                _ => 0.0,
            };
            ctx.submit_progress(&fetching, FETCH_START + fraction * (FETCH_END - FETCH_START));
        };
        let watch = TransferWatch {
            cancel: Some(ctx.cancel_token()),
            on_progress: Some(&on_progress),
        };

        let report = match self.mode {
            SyncMode::Ensure => SyncReport::Ensured {
                changed: self.unit.ensure_synced_watched(&watch)?,
            },
            SyncMode::Verify { replace } => {
                SyncReport::Verified(self.unit.verify_watched(replace, &watch)?)
            }
        };
        ctx.submit_progress(&format!("Finished {}", name), 1.0);
        Ok(report)
    }
}

/// Wrap descriptors as tasks, relocating each under `root` when given.
pub fn build_tasks(
    descriptors: Vec<SyncDescriptor>,
    root: Option<&Path>,
    mode: SyncMode,
    fetcher: Arc<dyn Fetch>,
) -> Vec<SyncTask> {
    descriptors
        .into_iter()
        .map(|mut descriptor| {
            if let Some(root) = root {
                descriptor.set_local_root(root);
            }
            SyncTask::new(SyncUnit::with_fetcher(descriptor, Arc::clone(&fetcher)), mode)
        })
        .collect()
}

/// Ensure every descriptor with the default curl fetcher on `workers` threads.
/// Blocks until each file has a result; results follow descriptor order.
pub fn sync_all(
    descriptors: Vec<SyncDescriptor>,
    root: Option<&Path>,
    workers: usize,
    observer: Arc<dyn ProgressObserver>,
) -> io::Result<Vec<Result<SyncReport, TaskError>>> {
    sync_all_with(descriptors, root, workers, observer, Arc::new(CurlFetcher::default()))
}

pub(crate) fn sync_all_with(
    descriptors: Vec<SyncDescriptor>,
    root: Option<&Path>,
    workers: usize,
    observer: Arc<dyn ProgressObserver>,
    fetcher: Arc<dyn Fetch>,
) -> io::Result<Vec<Result<SyncReport, TaskError>>> {
    let tasks = build_tasks(descriptors, root, SyncMode::Ensure, fetcher);
    let manager = TaskManager::new(tasks, "Syncing", workers, observer)?;
    Ok(manager.start().into_iter().map(TaskHandle::wait).collect())
}
