//! Sync event sink trait and implementations.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::SyncEvent;

/// Trait for receiving sync events.
///
/// `emit()` is called from inside the sync components and must be fast and
/// non-blocking. Failure to deliver must not affect synchronization.
pub trait SyncEventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

/// Discards every event.
#[derive(Clone, Default)]
pub struct NoOpSyncEventSink;

impl SyncEventSink for NoOpSyncEventSink {
    fn emit(&self, _event: SyncEvent) {}
}

/// Fans events out to any number of listeners.
#[derive(Clone)]
pub struct BroadcastSyncEventSink {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastSyncEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }
}

impl SyncEventSink for BroadcastSyncEventSink {
    fn emit(&self, event: SyncEvent) {
        // No listeners or lagging listeners are not an error.
        let _ = self.sender.send(event);
    }
}

/// Mock sink for testing - collects emitted events.
#[derive(Clone, Default)]
pub struct MockSyncEventSink {
    events: Arc<Mutex<Vec<SyncEvent>>>,
}

impl MockSyncEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the number of collected events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    /// Returns true if no events have been collected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears collected events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl SyncEventSink for MockSyncEventSink {
    fn emit(&self, event: SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
