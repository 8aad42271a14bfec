//! Shutdown coordination.

use tokio::sync::broadcast;

use crate::resilience::registry::Registry;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Notify listeners, then drain and remove every resilience manager.
    pub async fn teardown(&self, registry: &Registry) {
        tracing::info!(listeners = self.receiver_count(), "Shutdown triggered");
        self.trigger();
        registry.destroy_all().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
