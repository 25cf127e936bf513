//! Shared byte counter and throughput sampler.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of a task's progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Bytes written to the output so far. Never decreases.
    pub downloaded: u64,
    /// Bytes per second over the last sampler tick.
    pub speed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    status: Arc<RwLock<Status>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.write().downloaded += bytes;
    }

    pub fn snapshot(&self) -> Status {
        *self.read()
    }

    pub fn downloaded(&self) -> u64 {
        self.read().downloaded
    }

    /// Spawns the speed sampler. It runs until `stop` is cancelled; the
    /// returned handle resolves once the loop has exited.
    pub fn spawn_sampler(&self, interval: Duration, stop: CancellationToken) -> JoinHandle<()> {
        let tracker = self.clone();
        let seconds = interval.as_secs_f64();
        tokio::spawn(async move {
            let mut previous = tracker.downloaded();
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut status = tracker.write();
                        let delta = status.downloaded.saturating_sub(previous);
                        status.speed = (delta as f64 / seconds).round() as u64;
                        previous = status.downloaded;
                    }
                }
            }
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Status> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Status> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }
}
