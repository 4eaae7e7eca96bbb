//! Round-robin worker selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::pool::worker::{Worker, WorkerGuard};

/// Rotates through a service's workers, skipping saturated ones.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next worker with a free slot and claim it.
    pub fn acquire(&self, workers: &[Arc<Worker>]) -> Option<WorkerGuard> {
        if workers.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = workers.len();

        for i in 0..len {
            let worker = &workers[(start + i) % len];
            if let Some(guard) = worker.try_acquire() {
                return Some(guard);
            }
        }
        None
    }
}
