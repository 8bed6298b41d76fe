//! Shared driver for manifest batches: build tasks, print progress, honour Ctrl-C.

use anyhow::{Context, Result};
use cachesync_core::config::{self, SyncConfig};
use cachesync_core::error::TaskError;
use cachesync_core::fetch::CurlFetcher;
use cachesync_core::manifest::Manifest;
use cachesync_core::scheduler::{ChannelObserver, ProgressUpdate, TaskManager};
use cachesync_core::sync::{build_tasks, SyncMode, SyncReport};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL_MS: u128 = 500;
const PROGRESS_CHANNEL_SLOTS: usize = 1024;

/// Arguments shared by `sync` and `verify`.
#[derive(Debug, Clone)]
pub struct BatchArgs {
    pub manifest: PathBuf,
    pub root: Option<PathBuf>,
    pub workers: Option<usize>,
}

/// Per-entry results, in manifest order.
pub struct BatchResult {
    pub root: PathBuf,
    pub entries: Vec<(PathBuf, Result<SyncReport, TaskError>)>,
    pub interrupted: bool,
}

impl BatchResult {
    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &TaskError)> {
        self.entries
            .iter()
            .filter_map(|(path, r)| r.as_ref().err().map(|e| (path, e)))
    }
}

pub async fn run_batch(
    cfg: &SyncConfig,
    args: BatchArgs,
    title: &str,
    mode: SyncMode,
) -> Result<BatchResult> {
    let manifest = Manifest::load(&args.manifest)?;
    let root = match args.root.or_else(|| cfg.cache_root.clone()) {
        Some(root) => root,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let descriptors = manifest.descriptors(Some(&root))?;
    let paths: Vec<PathBuf> = descriptors.iter().map(|d| d.local_path()).collect();
    let workers = args.workers.unwrap_or_else(|| config::resolve_worker_count(cfg));
    tracing::info!(
        "{}: {} entries from {} into {} with {} workers",
        title,
        paths.len(),
        args.manifest.display(),
        root.display(),
        workers
    );

    let fetcher = Arc::new(CurlFetcher::new(cfg.curl_options()));
    let tasks = build_tasks(descriptors, None, mode, fetcher);

    let (progress_tx, progress_rx) = mpsc::channel::<ProgressUpdate>(PROGRESS_CHANNEL_SLOTS);
    let printer = spawn_printer(progress_rx);

    let manager = Arc::new(TaskManager::new(
        tasks,
        title,
        workers,
        Arc::new(ChannelObserver::new(progress_tx)),
    )?);
    let handles = manager.start();

    let stopper = Arc::clone(&manager);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted; stopping {} (re-run to verify touched files)", stopper.title());
            stopper.stop();
        }
    });

    let results = tokio::task::spawn_blocking(move || {
        handles.into_iter().map(|h| h.wait()).collect::<Vec<_>>()
    })
    .await?;
    interrupt.abort();
    let _ = interrupt.await;
    let interrupted = manager.is_stopped();
    let final_progress = manager.aggregated_progress().clamp(0.0, 1.0);
    tracing::info!("{} finished at {:.1}%", title, final_progress * 100.0);

    // Dropping the manager closes the progress channel so the printer drains and exits.
    drop(manager);
    let last_printed = printer.await.unwrap_or(None);
    if last_printed.map_or(true, |p| p < final_progress) {
        println!("  [{:5.1}%] {}", final_progress * 100.0, title);
    }

    Ok(BatchResult {
        root,
        entries: paths.into_iter().zip(results).collect(),
        interrupted,
    })
}

/// Print throttled progress lines until every sender is gone. Returns the
/// progress of the last line printed.
fn spawn_printer(mut rx: mpsc::Receiver<ProgressUpdate>) -> JoinHandle<Option<f64>> {
    tokio::spawn(async move {
        let mut last_print: Option<Instant> = None;
        let mut last_progress = None;
        while let Some(update) = rx.recv().await {
            let due = last_print
                .map(|t| t.elapsed().as_millis() >= PROGRESS_INTERVAL_MS)
                .unwrap_or(true);
            if due || update.progress >= 1.0 {
                println!("  [{:5.1}%] {}", update.percent(), update.detail);
                last_print = Some(Instant::now());
                last_progress = Some(update.progress);
            }
        }
        last_progress
    })
}
