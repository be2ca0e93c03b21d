//! Sync coordinator: ties every sync component to the session lifecycle.
//!
//! On session start it issues an eager foreground refresh and starts the push
//! subscription, debounced invalidator and poll scheduler. On session end it
//! stops all of them, clears the snapshot and reports `off`.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use tokio::sync::watch;

use super::config::SyncConfig;
use super::invalidator::DebouncedInvalidator;
use super::poller::PollScheduler;
use super::snapshot::{Snapshot, SnapshotStore};
use super::subscription::{ActiveSubscription, ConnectivityStatus, SubscriptionManager};
use super::transport::PushTransport;
use super::worker::{RefreshTrigger, RefreshWorker};
use crate::events::{NoOpSyncEventSink, SyncEventSink};
use crate::portfolio::PortfolioDataSource;
use crate::session::Session;

/// Resources owned by one active session.
struct ActiveSync {
    session: Session,
    trigger: RefreshTrigger,
    subscription: ActiveSubscription,
    invalidator: DebouncedInvalidator,
    poller: PollScheduler,
    worker: RefreshWorker,
}

impl ActiveSync {
    /// Stops every resource. Order: no new notifications, no pending timers,
    /// then the worker.
    fn stop(&self) {
        self.subscription.stop();
        self.invalidator.stop();
        self.poller.stop();
        self.worker.stop();
    }
}

/// Composition root of the sync core.
///
/// The data source and push transport are injected, constructed once by the
/// host and shared for the life of the process.
pub struct SyncCoordinator {
    config: SyncConfig,
    store: Arc<SnapshotStore>,
    subscriptions: SubscriptionManager,
    active: Mutex<Option<ActiveSync>>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        source: Arc<dyn PortfolioDataSource>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self::with_event_sink(config, source, transport, Arc::new(NoOpSyncEventSink))
    }

    pub fn with_event_sink(
        config: SyncConfig,
        source: Arc<dyn PortfolioDataSource>,
        transport: Arc<dyn PushTransport>,
        events: Arc<dyn SyncEventSink>,
    ) -> Self {
        Self {
            config,
            store: Arc::new(SnapshotStore::with_event_sink(source, events.clone())),
            subscriptions: SubscriptionManager::new(transport, config.subscribe_timeout(), events),
            active: Mutex::new(None),
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveSync>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.subscriptions.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectivityStatus> {
        self.subscriptions.subscribe_status()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Snapshot> {
        self.store.subscribe()
    }

    /// Effective poll interval in whole seconds.
    pub fn refresh_interval_seconds(&self) -> u64 {
        self.config.refresh_interval_seconds()
    }

    pub fn is_active(&self) -> bool {
        self.lock_active().is_some()
    }

    /// Handles a session becoming available.
    ///
    /// The same identity with rotated credentials keeps everything running.
    /// A different identity tears the previous session down first.
    ///
    /// The `active` lock is never held across a call that may reach the event
    /// sink, so a sink may call back into the coordinator.
    pub fn activate(&self, session: Session) {
        let previous = {
            let mut active = self.lock_active();
            if let Some(current) = active.as_mut() {
                if current.session.same_identity(&session) {
                    if current.session != session {
                        debug!("Session credentials rotated for user {}", session.user_id);
                        self.store.update_credentials(session.clone());
                        current.session = session;
                    }
                    return;
                }
                info!(
                    "Session changed from user {} to {}, restarting sync",
                    current.session.user_id, session.user_id
                );
            }
            active.take()
        };
        if let Some(previous) = previous {
            self.teardown(previous);
        }

        info!("Starting portfolio sync for user {}", session.user_id);
        let generation = self.store.activate(session.clone());
        let started = self.start(session, generation);

        let installed = {
            let mut active = self.lock_active();
            if self.store.generation() == generation {
                Ok(active.replace(started))
            } else {
                Err(started)
            }
        };

        match installed {
            Ok(Some(stale)) => stale.stop(),
            Ok(None) => {}
            Err(superseded) => {
                // Another transition ran while this session was starting.
                debug!("Session generation {} superseded during start", generation);
                superseded.stop();
                if !self.store.is_active() {
                    self.subscriptions.mark_off();
                }
            }
        }
    }

    /// Spawns the worker, invalidator, subscription and poller for a session
    /// the store has just activated as `generation`.
    fn start(&self, session: Session, generation: u64) -> ActiveSync {
        let (trigger, worker) = RefreshWorker::spawn(self.store.clone(), generation);
        let invalidator = DebouncedInvalidator::start(self.config.debounce_window(), trigger.clone());

        // status -> connecting, then the eager foreground load
        let subscription = self.subscriptions.start(&session, invalidator.notifier());
        trigger.blocking();
        let poller = PollScheduler::start(self.config.poll_interval(), trigger.clone());

        ActiveSync {
            session,
            trigger,
            subscription,
            invalidator,
            poller,
            worker,
        }
    }

    /// Handles the session ending. Idempotent.
    pub fn deactivate(&self) {
        let previous = self.lock_active().take();
        match previous {
            Some(previous) => {
                info!("Stopping portfolio sync for user {}", previous.session.user_id);
                self.teardown(previous);
            }
            None => {
                self.store.deactivate();
                self.subscriptions.mark_off();
            }
        }
    }

    fn teardown(&self, previous: ActiveSync) {
        previous.stop();
        self.store.deactivate();
        self.subscriptions.mark_off();
    }

    /// Manual foreground refresh, identical to the initial load.
    pub fn refresh_now(&self) {
        match self.lock_active().as_ref() {
            Some(active) => {
                active.trigger.blocking();
            }
            None => debug!("Manual refresh ignored: no active session"),
        }
    }

    /// Dismisses the snapshot error.
    pub fn clear_error(&self) {
        self.store.clear_error();
    }

    /// Follows a session stream until it closes, then tears down.
    pub async fn run(&self, mut sessions: watch::Receiver<Option<Session>>) {
        loop {
            let current = sessions.borrow_and_update().clone();
            match current {
                Some(session) => self.activate(session),
                None => self.deactivate(),
            }

            if sessions.changed().await.is_err() {
                debug!("Session stream closed");
                break;
            }
        }
        self.deactivate();
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        let previous = self.lock_active().take();
        if let Some(previous) = previous {
            previous.stop();
        }
    }
}
