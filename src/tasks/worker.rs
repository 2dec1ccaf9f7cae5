//! Handles for background tasks that must stop cleanly

use std::future::Future;

use tokio::{sync::watch, task::JoinHandle};
use tracing::{info, warn};

/// A spawned background loop with a shutdown channel.
///
/// Loops receive a `watch::Receiver<bool>` and must exit once it changes.
/// [`Worker::shutdown`] waits for the loop to return, so no tick runs after
/// it completes.
#[derive(Debug)]
pub struct Worker {
    name: &'static str,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<F, Fut>(name: &'static str, task: F) -> Self
    where
        F: FnOnce(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(task(shutdown_rx));
        Self {
            name,
            shutdown_tx,
            handle,
        }
    }

    /// Signal the loop and wait for it to finish
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);
        match self.handle.await {
            Ok(()) => info!("{} stopped", self.name),
            Err(e) => warn!("{} ended abnormally: {}", self.name, e),
        }
    }
}
