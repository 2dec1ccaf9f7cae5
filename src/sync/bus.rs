//! In-process pub/sub between the timer and its windows

use futures::stream::{self, Stream};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use super::SyncMessage;

/// At-most-once fan-out of [`SyncMessage`]s.
///
/// Publishing never fails the caller: with no subscribers the message is
/// dropped, and a subscriber that falls behind skips to the newest messages.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncMessage>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, message: SyncMessage) {
        let name = message.name();
        match self.tx.send(message) {
            Ok(receivers) => debug!("Published {} to {} subscriber(s)", name, receivers),
            Err(_) => debug!("No subscribers for {}, message dropped", name),
        }
    }

    /// Subscribe to every message published from now on.
    ///
    /// Dropping the subscription unsubscribes.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiving end of the bus
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<SyncMessage>,
}

impl Subscription {
    /// Wait for the next message; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<SyncMessage> {
        loop {
            match self.rx.recv().await {
                Ok(message) => return Some(message),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Sync subscriber lagged, skipped {} message(s)", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<SyncMessage> {
        loop {
            match self.rx.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Sync subscriber lagged, skipped {} message(s)", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<SyncMessage> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn into_stream(self) -> impl Stream<Item = SyncMessage> + Send {
        stream::unfold(self, |mut subscription| async move {
            let message = subscription.recv().await?;
            Some((message, subscription))
        })
    }
}
