use std::sync::Arc;

use folio_sync_client::PortfolioApiClient;
use folio_sync_core::events::{BroadcastSyncEventSink, SyncEvent};
use folio_sync_core::sync::NoopTransport;
use folio_sync_core::{ConnectivityStatus, Snapshot, SyncCoordinator};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

const EVENT_CAPACITY: usize = 256;

pub fn init_tracing() {
    let log_format = std::env::var("FOLIO_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub struct Daemon {
    pub coordinator: Arc<SyncCoordinator>,
    pub events: Arc<BroadcastSyncEventSink>,
}

/// Wires the REST data source and the push transport into a coordinator.
///
/// No push transport is available to a headless host, so the coordinator
/// reports `error` for push and keeps the snapshot fresh by polling.
pub fn build_daemon(config: &Config) -> anyhow::Result<Daemon> {
    let client = Arc::new(PortfolioApiClient::new(&config.api_base_url)?);
    tracing::info!("Portfolio API: {}", client.base_url());

    let events = Arc::new(BroadcastSyncEventSink::new(EVENT_CAPACITY));
    let coordinator = Arc::new(SyncCoordinator::with_event_sink(
        config.sync,
        client,
        Arc::new(NoopTransport),
        events.clone(),
    ));
    tracing::info!(
        "Polling every {}s, debounce {:?}",
        coordinator.refresh_interval_seconds(),
        config.sync.debounce_window()
    );

    Ok(Daemon {
        coordinator,
        events,
    })
}

pub fn spawn_status_logger(mut status: watch::Receiver<ConnectivityStatus>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            match current {
                ConnectivityStatus::Error => {
                    tracing::warn!("Realtime status: {} (polling only)", current)
                }
                _ => tracing::info!("Realtime status: {}", current),
            }
        }
    })
}

/// Remembers the last reported snapshot error, so an error that persists
/// across flag changes and failed polls is logged once.
#[derive(Debug, Default)]
struct ErrorTracker {
    last: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum ErrorChange<'a> {
    Raised(&'a str),
    Cleared,
}

impl ErrorTracker {
    fn observe<'a>(&mut self, error: Option<&'a str>) -> Option<ErrorChange<'a>> {
        if self.last.as_deref() == error {
            return None;
        }
        self.last = error.map(str::to_string);
        Some(match error {
            Some(message) => ErrorChange::Raised(message),
            None => ErrorChange::Cleared,
        })
    }
}

pub fn spawn_snapshot_logger(mut snapshot: watch::Receiver<Snapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_synced = None;
        let mut errors = ErrorTracker::default();
        while snapshot.changed().await.is_ok() {
            let current = snapshot.borrow_and_update().clone();
            if current.last_synced_at != last_synced {
                last_synced = current.last_synced_at;
                if let Some(at) = last_synced {
                    tracing::info!(
                        "Snapshot synced at {}: {} position(s), {} lot(s)",
                        at.to_rfc3339(),
                        current.positions.len(),
                        current.lots.len()
                    );
                }
            }
            match errors.observe(current.error.as_deref()) {
                Some(ErrorChange::Raised(error)) => tracing::warn!("Snapshot error: {}", error),
                Some(ErrorChange::Cleared) => tracing::info!("Snapshot error cleared"),
                None => {}
            }
        }
    })
}

pub fn spawn_event_logger(mut events: broadcast::Receiver<SyncEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let payload = serde_json::to_string(&event).unwrap_or_default();
                    tracing::debug!(event = event.name(), "{}", payload);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Event logger lagged, skipped {} event(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisting_error_is_reported_once() {
        let mut errors = ErrorTracker::default();

        assert_eq!(errors.observe(None), None);
        assert_eq!(
            errors.observe(Some("Service unavailable")),
            Some(ErrorChange::Raised("Service unavailable"))
        );
        // syncing raised and lowered again by the next failed poll
        assert_eq!(errors.observe(Some("Service unavailable")), None);
        assert_eq!(errors.observe(Some("Service unavailable")), None);

        assert_eq!(
            errors.observe(Some("Not authenticated")),
            Some(ErrorChange::Raised("Not authenticated"))
        );
        assert_eq!(errors.observe(None), Some(ErrorChange::Cleared));
        assert_eq!(errors.observe(None), None);
    }

    #[tokio::test]
    async fn test_snapshot_logger_stops_with_sender() {
        let (tx, rx) = watch::channel(Snapshot::default());
        let logger = spawn_snapshot_logger(rx);

        tx.send_modify(|snapshot| snapshot.error = Some("boom".to_string()));
        tx.send_modify(|snapshot| snapshot.syncing = true);
        drop(tx);

        logger.await.unwrap();
    }
}
