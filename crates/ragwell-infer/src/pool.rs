//! Bounded pool for blocking model work.
//!
//! Model loads and encodes are CPU/GPU bound and synchronous. Each job runs on
//! tokio's blocking threads while holding one of `size` permits, so at most
//! `size` jobs execute at once and the rest queue on the semaphore.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tracing::info;

use ragwell_core::{Error, Result};

pub struct WorkerPool {
    semaphore: Semaphore,
    size: usize,
    shut_down: AtomicBool,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Semaphore::new(size),
            size,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Run a blocking job on the pool and wait for its result.
    pub async fn run<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::WorkerPool("worker pool is shut down".into()))?;

        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| Error::WorkerPool(format!("worker task failed: {e}")))
    }

    /// Refuse new and queued jobs. Jobs already running finish.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            self.semaphore.close();
            info!("Worker pool shut down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
