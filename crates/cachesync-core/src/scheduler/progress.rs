//! Aggregated progress: a lock-free `f64` accumulator and the observer seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives aggregated progress. Called from worker threads, so
/// implementations must be thread-safe.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, title: &str, detail: &str, progress: f64);
}

impl<F> ProgressObserver for F
where
    F: Fn(&str, &str, f64) + Send + Sync,
{
    fn on_progress(&self, title: &str, detail: &str, progress: f64) {
        self(title, detail, progress)
    }
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_progress(&self, _title: &str, _detail: &str, _progress: f64) {}
}

/// Owned snapshot of one progress callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub title: String,
    pub detail: String,
    /// Aggregated fraction; approaches 1.0 when every task finished.
    pub progress: f64,
}

impl ProgressUpdate {
    /// Fraction clamped to [0.0, 1.0], as a percentage.
    pub fn percent(&self) -> f64 {
        self.progress.clamp(0.0, 1.0) * 100.0
    }
}

/// Forwards updates into a tokio channel without ever blocking a worker.
/// Updates are dropped when the channel is full or closed.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: tokio::sync::mpsc::Sender<ProgressUpdate>,
}

impl ChannelObserver {
    pub fn new(tx: tokio::sync::mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx }
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_progress(&self, title: &str, detail: &str, progress: f64) {
        let _ = self.tx.try_send(ProgressUpdate {
            title: title.to_string(),
            detail: detail.to_string(),
            progress,
        });
    }
}

/// `f64` with atomic read-modify-write, stored as raw bits.
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::SeqCst))
    }

    /// Adds `delta` and returns the previous value. CAS loop, never loses an update.
    pub(crate) fn fetch_add(&self, delta: f64) -> f64 {
        self.fetch_update(|current| current + delta)
    }

    /// Stores `max(current, value)` and returns the previous value.
    pub(crate) fn fetch_max(&self, value: f64) -> f64 {
        self.fetch_update(|current| current.max(value))
    }

    fn fetch_update(&self, f: impl Fn(f64) -> f64) -> f64 {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            let next = f(f64::from_bits(current)).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(previous) => return f64::from_bits(previous),
                Err(actual) => current = actual,
            }
        }
    }
}

/// Manager-side sink for task deltas. Each task's delta is weighted by
/// `1 / task_count`, so the total reaches 1.0 only when every task did.
pub struct ProgressAggregator {
    title: String,
    task_count: usize,
    total: AtomicF64,
    observer: Arc<dyn ProgressObserver>,
}

impl ProgressAggregator {
    pub fn new(
        title: impl Into<String>,
        task_count: usize,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            title: title.into(),
            task_count: task_count.max(1),
            total: AtomicF64::new(0.0),
            observer,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current aggregated total. Not clamped.
    pub fn total(&self) -> f64 {
        self.total.load()
    }

    /// Fold one task delta into the total and notify the observer.
    pub fn receive(&self, detail: &str, delta: f64) {
        let share = delta.max(0.0) / self.task_count as f64;
        let total = self.total.fetch_add(share) + share;
        self.observer.on_progress(&self.title, detail, total);
    }
}

impl std::fmt::Debug for ProgressAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAggregator")
            .field("title", &self.title)
            .field("task_count", &self.task_count)
            .field("total", &self.total.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn atomic_f64_concurrent_adds_are_not_lost() {
        let acc = Arc::new(AtomicF64::new(0.0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let acc = Arc::clone(&acc);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        acc.fetch_add(1.0);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(acc.load(), 8000.0);
    }

    #[test]
    fn fetch_max_keeps_high_water_mark() {
        let acc = AtomicF64::new(0.5);
        assert_eq!(acc.fetch_max(0.3), 0.5);
        assert_eq!(acc.load(), 0.5);
        assert_eq!(acc.fetch_max(0.9), 0.5);
        assert_eq!(acc.load(), 0.9);
    }

    #[test]
    fn aggregator_weights_by_task_count() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observer = move |title: &str, detail: &str, p: f64| {
            sink.lock().unwrap().push((title.to_string(), detail.to_string(), p));
        };
        let agg = ProgressAggregator::new("Sync", 4, Arc::new(observer));
        agg.receive("a", 1.0);
        agg.receive("b", 0.5);
        assert!((agg.total() - 0.375).abs() < 1e-12);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("Sync".to_string(), "a".to_string(), 0.25));
        assert!((seen[1].2 - 0.375).abs() < 1e-12);
    }

    #[test]
    fn aggregator_ignores_negative_deltas() {
        let agg = ProgressAggregator::new("t", 1, Arc::new(NoopObserver));
        agg.receive("x", -0.4);
        assert_eq!(agg.total(), 0.0);
    }

    #[test]
    fn channel_observer_forwards_updates() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(4);
        let observer = ChannelObserver::new(tx);
        observer.on_progress("Sync", "file.bin", 0.5);
        let update = rx.try_recv().unwrap();
        assert_eq!(update.detail, "file.bin");
        assert_eq!(update.percent(), 50.0);
    }
}
