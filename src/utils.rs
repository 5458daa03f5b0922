//! Shutdown signaling shared by the coordinator, retry executor and API.

use tokio::sync::watch;
use tracing::info;

/// Broadcast side of the shutdown signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// Per-task handle awaiting shutdown. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// New, untriggered shutdown signal.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Handle for a task that needs to observe shutdown.
    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger shutdown. All listeners wake.
    pub fn trigger(&self) {
        // Send only fails with no receivers, which is fine at exit.
        let _ = self.tx.send(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownListener {
    /// Whether shutdown has been triggered.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown triggers. Returns immediately if it already has.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow() {
            if self.rx.changed().await.is_err() {
                // Sender dropped: treat as shutdown.
                return;
            }
        }
    }
}

/// Trigger the given shutdown on ctrl-c.
pub async fn shutdown_on_ctrl_c(shutdown: &Shutdown) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received, draining");
        shutdown.trigger();
    }
}
