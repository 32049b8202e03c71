//! Delivery of detection events to viewers

use occupancy::DetectionEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// Receives every event the loop produces
pub trait Publisher: Send + Sync {
    fn publish(&self, event: DetectionEvent);
}

/// Fans events out to any number of subscribers.
///
/// A subscriber that falls behind skips the oldest events instead of
/// holding up the loop.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Arc<DetectionEvent>>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DetectionEvent>> {
        self.tx.subscribe()
    }

    /// Number of connected viewers
    pub fn viewer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: DetectionEvent) {
        if self.tx.send(Arc::new(event)).is_err() {
            trace!("No viewers connected, event dropped");
        }
    }
}
