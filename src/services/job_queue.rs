//! FIFO work queue shared by several workers
//!
//! Thin wrapper over an unbounded `flume` channel. The queue owns both ends,
//! so pushes never fail while it is alive. Consumers pop with a bounded wait
//! so they can notice shutdown between items.

use std::time::Duration;

use tracing::warn;

/// Multi-producer, multi-consumer FIFO queue
pub struct WorkQueue<T> {
    name: String,
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> WorkQueue<T> {
    pub fn new(name: &str) -> Self {
        let (sender, receiver) = flume::unbounded();
        Self {
            name: name.to_string(),
            sender,
            receiver,
        }
    }

    /// Append an item; never blocks
    pub fn push(&self, item: T) {
        if self.sender.send(item).is_err() {
            // Unreachable while self holds the receiver
            warn!(queue = %self.name, "Queue disconnected, item dropped");
        }
    }

    /// Take the oldest item, waiting at most `wait` for one to arrive
    pub async fn pop(&self, wait: Duration) -> Option<T> {
        match tokio::time::timeout(wait, self.receiver.recv_async()).await {
            Ok(Ok(item)) => Some(item),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Take the oldest item without waiting
    pub fn try_pop(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
