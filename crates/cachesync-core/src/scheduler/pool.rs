//! Fixed-size worker pool.
//!
//! Workers pull boxed jobs from one shared queue. The pool is sized once and
//! never grows or shrinks. `stop()` flips the shared cancel token, closes the
//! queue and drops every job still waiting in it, without joining workers
//! that are busy.

use std::io;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::control::CancelToken;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
    cancel: CancelToken,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let queue = Arc::new(Mutex::new(rx));
        let cancel = CancelToken::new();
        for i in 0..size {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("cachesync-worker-{}", i))
                .spawn(move || worker_loop(&queue, &cancel))?;
        }
        tracing::debug!(workers = size, "worker pool started");
        Ok(Self {
            sender: Mutex::new(Some(tx)),
            queue,
            cancel,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Token flipped by [`WorkerPool::stop`]; handed to running jobs.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Queue a job. Returns `false` (dropping the job) once the pool is stopped.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) if !self.cancel.is_cancelled() => tx.send(Box::new(job)).is_ok(),
            _ => false,
        }
    }

    /// Cancel in-flight work and discard queued jobs. Returns without waiting
    /// for busy workers to notice.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // With the sender gone an idle worker's recv() fails immediately, so this
        // lock is only ever held briefly.
        let rx = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dropped = 0usize;
        while let Ok(job) = rx.try_recv() {
            drop(job);
            dropped += 1;
        }
        tracing::info!(dropped, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets idle workers exit; busy ones exit after their job.
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

fn worker_loop(queue: &Mutex<mpsc::Receiver<Job>>, cancel: &CancelToken) {
    loop {
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            break;
        };
        if cancel.is_cancelled() {
            drop(job);
            continue;
        }
        job();
    }
}
