//! Shutdown coordination.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::lifecycle::signals;

/// Broadcasts a single shutdown notice to every server task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        if self.tx.send(()).is_err() {
            tracing::debug!("Shutdown triggered with no listeners");
        }
    }

    /// Trigger once the process receives a termination signal.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            signals::terminated().await;
            tracing::info!("Shutdown signal received");
            this.trigger();
        })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves when `rx` sees the notice or its sender is gone.
pub async fn notified(mut rx: broadcast::Receiver<()>) {
    let _ = rx.recv().await;
}
