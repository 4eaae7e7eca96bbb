//! A single worker process.
//!
//! # Responsibilities
//! - Hold the worker's address and pre-built base URL
//! - Enforce the per-worker connection limit
//! - Hand out RAII slot guards that release on drop

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use url::Url;

/// A worker serving one service.
#[derive(Debug)]
pub struct Worker {
    pub addr: SocketAddr,
    pub base_url: Url,
    pub max_connections: usize,
    pub active_connections: AtomicUsize,
}

impl Worker {
    pub fn new(addr: SocketAddr, max_connections: usize) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&format!("http://{}", addr))?;
        Ok(Self {
            addr,
            base_url,
            max_connections,
            active_connections: AtomicUsize::new(0),
        })
    }

    pub fn active(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn has_capacity(&self) -> bool {
        self.active() < self.max_connections
    }

    /// Absolute URL for a path on this worker.
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path)
    }

    /// Claim a connection slot, or `None` when the worker is saturated.
    pub fn try_acquire(self: &Arc<Self>) -> Option<WorkerGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(WorkerGuard {
            worker: self.clone(),
        })
    }
}

/// Holds one connection slot on a worker for as long as it lives.
#[derive(Debug)]
pub struct WorkerGuard {
    worker: Arc<Worker>,
}

impl Deref for WorkerGuard {
    type Target = Worker;
    fn deref(&self) -> &Self::Target {
        &self.worker
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.worker.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
