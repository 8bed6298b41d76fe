//! Integration test: batches of sync tasks on the worker pool, progress
//! aggregation across threads, and stop() in the middle of a batch.

mod common;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cachesync_core::fetch::CurlFetcher;
use cachesync_core::scheduler::{ChannelObserver, ProgressObserver, TaskManager, TaskState};
use cachesync_core::sync::{build_tasks, SyncDescriptor, SyncMode, SyncReport};
use tempfile::tempdir;

fn descriptors(server: &common::fixture_server::FixtureServer, n: usize) -> Vec<SyncDescriptor> {
    (0..n)
        .map(|i| {
            SyncDescriptor::new(&server.url(&format!("f{}.bin", i)), &format!("out/f{}.bin", i))
                .unwrap()
        })
        .collect()
}

fn files(n: usize) -> Vec<(String, Vec<u8>)> {
    (0..n)
        .map(|i| (format!("f{}.bin", i), vec![i as u8; 4096 + i]))
        .collect()
}

fn run_batch(n: usize, workers: usize) {
    let served = files(n);
    let server = common::fixture_server::start(
        served.iter().map(|(p, b)| (p.as_str(), b.clone())).collect(),
    );
    let root = tempdir().unwrap();
    let seen = Arc::new(Mutex::new(Vec::<f64>::new()));
    let sink = Arc::clone(&seen);
    let observer: Arc<dyn ProgressObserver> = Arc::new(move |_: &str, _: &str, p: f64| {
        sink.lock().unwrap().push(p);
    });

    let tasks = build_tasks(
        descriptors(&server, n),
        Some(root.path()),
        SyncMode::Ensure,
        Arc::new(CurlFetcher::default()),
    );
    let manager = TaskManager::new(tasks, "Syncing", workers, observer).unwrap();
    let reports = manager.start_and_await().unwrap();

    assert_eq!(reports.len(), n);
    assert!(reports
        .iter()
        .all(|r| *r == SyncReport::Ensured { changed: true }));
    assert!((manager.aggregated_progress() - 1.0).abs() < 1e-9);
    for (i, (_, body)) in served.iter().enumerate() {
        let local = root.path().join("out").join(format!("f{}.bin", i));
        assert_eq!(&std::fs::read(local).unwrap(), body);
        assert_eq!(manager.task_state(i), Some(TaskState::Done));
    }
    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|p| *p >= 0.0 && *p <= 1.0 + 1e-9));
    assert!(seen.iter().any(|p| (*p - 1.0).abs() < 1e-9));
}

#[test]
fn single_task_batch_reaches_full_progress() {
    run_batch(1, 1);
}

#[test]
fn ten_task_batch_reaches_full_progress() {
    run_batch(10, 3);
}

#[test]
fn hundred_task_batch_reaches_full_progress() {
    run_batch(100, 8);
}

#[test]
fn stop_mid_batch_cancels_everything_in_flight() {
    let body = vec![7u8; 64 * 1024];
    let server = common::fixture_server::start_with_options(
        (0..4).map(|i| (["f0.bin", "f1.bin", "f2.bin", "f3.bin"][i], body.clone())).collect(),
        common::fixture_server::FixtureOptions {
            chunk_delay: Some(Duration::from_millis(20)),
            chunk_size: 1024,
        },
    );
    let root = tempdir().unwrap();
    let tasks = build_tasks(
        descriptors(&server, 4),
        Some(root.path()),
        SyncMode::Ensure,
        Arc::new(CurlFetcher::default()),
    );
    let observer: Arc<dyn ProgressObserver> = Arc::new(|_: &str, _: &str, _: f64| {});
    let manager = TaskManager::new(tasks, "Syncing", 2, observer).unwrap();
    let handles = manager.start();
    thread::sleep(Duration::from_millis(300));
    manager.stop();

    for mut handle in handles {
        let index = handle.index();
        let result = handle
            .wait_timeout(Duration::from_secs(10))
            .expect("handle must resolve after stop");
        let err = result.expect_err("no task can finish a slow transfer before stop");
        assert!(err.is_cancelled(), "task {} should be cancelled, got {}", index, err);
        let local = root.path().join("out").join(format!("f{}.bin", index));
        assert!(!local.exists(), "cancelled transfer must not leave {}", local.display());
    }
}

#[tokio::test]
async fn channel_observer_streams_updates() {
    let server = common::fixture_server::start(vec![("f0.bin", vec![1u8; 512])]);
    let root = tempdir().unwrap();
    let (tx, mut rx) = tokio::sync::mpsc::channel(4096);
    let tasks = build_tasks(
        descriptors(&server, 1),
        Some(root.path()),
        SyncMode::Ensure,
        Arc::new(CurlFetcher::default()),
    );
    let observer = Arc::new(ChannelObserver::new(tx));
    let manager = TaskManager::new(tasks, "Syncing", 1, observer).unwrap();
    let reports = tokio::task::spawn_blocking(move || manager.start_and_await())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reports.len(), 1);

    let mut last = None;
    while let Ok(update) = rx.try_recv() {
        assert_eq!(update.title, "Syncing");
        last = Some(update);
    }
    let last = last.expect("at least one update");
    assert!((last.progress - 1.0).abs() < 1e-9);
    assert!(last.detail.contains("f0.bin"));
}
