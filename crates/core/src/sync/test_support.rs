//! Fakes shared by the sync unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::snapshot::SnapshotStore;
use super::transport::{ChannelSpec, PushTransport, SubscriptionHandle, TransportMessage};
use super::worker::{RefreshTrigger, RefreshWorker};
use crate::errors::{FetchError, SubscriptionError};
use crate::portfolio::{AssetType, Lot, PortfolioDataSource, Position};
use crate::session::Session;

/// Data source that records every positions fetch.
///
/// Returns `lot_count` identical lots and no positions. Latency and failure
/// are adjustable between fetches.
#[derive(Default)]
pub(crate) struct CountingSource {
    latency: Duration,
    lot_count: AtomicUsize,
    failure: Mutex<Option<FetchError>>,
    fetched_at: Mutex<Vec<Instant>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingSource {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub(crate) fn set_lot_count(&self, count: usize) {
        self.lot_count.store(count, Ordering::SeqCst);
    }

    pub(crate) fn set_failure(&self, failure: Option<FetchError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetched_at.lock().unwrap().len()
    }

    pub(crate) fn fetch_times(&self) -> Vec<Instant> {
        self.fetched_at.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn lot(id: i64) -> Lot {
        Lot {
            id,
            asset_id: 1,
            asset_symbol: "BTC".to_string(),
            asset_name: "Bitcoin".to_string(),
            asset_type: AssetType::Crypto,
            quantity: dec!(1),
            unit_cost: dec!(100),
            purchased_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }
}

#[async_trait]
impl PortfolioDataSource for CountingSource {
    async fn fetch_positions(&self, _session: &Session) -> Result<Vec<Position>, FetchError> {
        self.fetched_at.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(vec![]),
        }
    }

    async fn fetch_lots(&self, _session: &Session) -> Result<Vec<Lot>, FetchError> {
        let count = self.lot_count.load(Ordering::SeqCst);
        Ok((0..count as i64).map(CountingSource::lot).collect())
    }
}

/// Activates `user-1` on a fresh store and spawns its refresh worker.
pub(crate) fn active_worker(
    source: Arc<CountingSource>,
) -> (Arc<SnapshotStore>, RefreshTrigger, RefreshWorker) {
    let store = Arc::new(SnapshotStore::new(source));
    let generation = store.activate(Session::new("user-1", "token"));
    let (trigger, worker) = RefreshWorker::spawn(store.clone(), generation);
    (store, trigger, worker)
}

/// Lets spawned tasks run until they park.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Transport that keeps each subscriber's message sender so a test can
/// deliver arbitrary messages or drop the channel.
#[derive(Default)]
pub(crate) struct CapturingTransport {
    senders: Mutex<Vec<mpsc::UnboundedSender<TransportMessage>>>,
}

impl CapturingTransport {
    pub(crate) fn send(&self, message: TransportMessage) {
        for sender in self.senders.lock().unwrap().iter() {
            let _ = sender.send(message.clone());
        }
    }

    /// Drops every captured sender, closing the channels.
    pub(crate) fn close_all(&self) {
        self.senders.lock().unwrap().clear();
    }
}

impl PushTransport for CapturingTransport {
    fn subscribe(
        &self,
        _spec: ChannelSpec,
        sink: mpsc::UnboundedSender<TransportMessage>,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        self.senders.lock().unwrap().push(sink);
        Ok(SubscriptionHandle::new())
    }

    fn unsubscribe(&self, _handle: &SubscriptionHandle) {}
}
