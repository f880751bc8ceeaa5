//! Shutdown signal handling.
//!
//! SIGTERM and SIGINT (Ctrl+C elsewhere) trigger a graceful shutdown of the
//! HTTP listener.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Watches for shutdown signals.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHandler {
    /// Creates a handler with no shutdown requested.
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    /// Spawns the task listening for process signals.
    #[cfg(unix)]
    pub fn spawn_listener(&self) {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        warn!(error = %e, "Failed to install signal handlers");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, initiating shutdown"),
                _ = sigint.recv() => info!("Received SIGINT, initiating shutdown"),
            }
            let _ = shutdown_tx.send(true);
            debug!("Signal listener stopped");
        });
    }

    /// Spawns the task listening for Ctrl+C.
    #[cfg(not(unix))]
    pub fn spawn_listener(&self) {
        let shutdown_tx = self.shutdown_tx.clone();
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received Ctrl+C, initiating shutdown");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    /// Requests a shutdown without a signal.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns true once shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Completes when shutdown is requested.
    pub async fn shutdown(&self) {
        let mut rx = self.shutdown_rx.clone();
        // A closed channel means the handler is gone; stop as well.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn trigger_completes_shutdown() {
        let handler = SignalHandler::new();
        assert!(!handler.is_shutdown());

        let waiter = handler.clone();
        let task = tokio::spawn(async move { waiter.shutdown().await });

        handler.trigger_shutdown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("shutdown should complete")
            .unwrap();
        assert!(handler.is_shutdown());
    }

    #[tokio::test]
    async fn shutdown_after_trigger_returns_immediately() {
        let handler = SignalHandler::new();
        handler.trigger_shutdown();
        handler.shutdown().await;
    }
}
