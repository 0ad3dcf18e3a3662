//! Typed publish/subscribe channel shared through the offline context.
//!
//! Replaces platform-wide ad-hoc event dispatch: subscribers take an
//! explicit receiver and drop it to unsubscribe.

use tokio::sync::broadcast;

/// Events crossing component boundaries inside the offline subsystem.
#[derive(Debug, Clone)]
pub enum OfflineEvent {
    /// Live API traffic produced a payload worth snapshotting.
    /// Emitted by the interceptor, consumed by the store's seeder.
    DataAvailable {
        endpoint: String,
        payload: serde_json::Value,
    },
    /// The connectivity flag genuinely changed.
    /// Emitted by the monitor, consumed by page chrome and anything else
    /// that cares.
    ConnectivityChanged { online: bool },
}

/// Broadcast bus for [`OfflineEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OfflineEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OfflineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is simply
    /// dropped.
    pub fn publish(&self, event: OfflineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("offline event dropped: no subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
