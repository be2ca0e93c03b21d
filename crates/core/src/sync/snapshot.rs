//! Snapshot store: the single owner of the locally cached portfolio.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use tokio::sync::watch;

use crate::errors::FetchError;
use crate::events::{NoOpSyncEventSink, SyncEvent, SyncEventSink};
use crate::portfolio::{Lot, PortfolioDataSource, Position};
use crate::session::Session;

/// Locally cached portfolio state at the last successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub positions: Vec<Position>,
    pub lots: Vec<Lot>,
    /// A blocking (non-silent) refresh is running
    pub loading: bool,
    /// A background (silent) refresh is running
    pub syncing: bool,
    /// Message of the last failed refresh, cleared by the next success
    pub error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct StoreState {
    session: Option<Session>,
    /// Bumped on every activation and deactivation. Results are applied only
    /// when the generation they were fetched under is still current.
    generation: u64,
}

/// Holds the snapshot for the active session and refreshes it from a
/// [`PortfolioDataSource`].
///
/// The store does not serialize refreshes itself; the coordinator's refresh
/// worker guarantees at most one is in flight.
pub struct SnapshotStore {
    source: Arc<dyn PortfolioDataSource>,
    events: Arc<dyn SyncEventSink>,
    state: Mutex<StoreState>,
    snapshot: watch::Sender<Snapshot>,
}

impl SnapshotStore {
    pub fn new(source: Arc<dyn PortfolioDataSource>) -> Self {
        Self::with_event_sink(source, Arc::new(NoOpSyncEventSink))
    }

    pub fn with_event_sink(
        source: Arc<dyn PortfolioDataSource>,
        events: Arc<dyn SyncEventSink>,
    ) -> Self {
        let (snapshot, _receiver) = watch::channel(Snapshot::default());
        Self {
            source,
            events,
            state: Mutex::new(StoreState::default()),
            snapshot,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Starts a new session with an empty snapshot. Returns the new generation.
    pub fn activate(&self, session: Session) -> u64 {
        let mut state = self.lock_state();
        state.generation += 1;
        state.session = Some(session);
        self.snapshot.send_replace(Snapshot::default());
        state.generation
    }

    /// Ends the current session and discards its snapshot.
    pub fn deactivate(&self) {
        let mut state = self.lock_state();
        state.generation += 1;
        state.session = None;
        self.snapshot.send_replace(Snapshot::default());
    }

    /// Replaces the credentials of the active session when the identity is
    /// unchanged. The snapshot and any in-flight refresh stay valid.
    pub fn update_credentials(&self, session: Session) -> bool {
        let mut state = self.lock_state();
        match state.session.as_mut() {
            Some(current) if current.same_identity(&session) => {
                *current = session;
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().session.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    /// Copy of the current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified whenever the snapshot or its flags change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Dismisses the last refresh error.
    pub fn clear_error(&self) {
        let _state = self.lock_state();
        self.snapshot.send_if_modified(|snapshot| snapshot.error.take().is_some());
    }

    /// Re-fetches positions and lots and swaps both into the snapshot.
    ///
    /// Does nothing when no session is active. A non-silent refresh raises
    /// `loading`, a silent one raises `syncing`; the flag is lowered again on
    /// every exit path. On failure the previous collections are kept and the
    /// error message is recorded on the snapshot.
    pub async fn refresh(&self, silent: bool) -> Result<(), FetchError> {
        let generation = self.generation();
        self.refresh_generation(generation, silent).await
    }

    /// Refreshes on behalf of `generation`. Does nothing once that generation
    /// has ended, so a worker left over from a previous session cannot touch
    /// the current one.
    pub async fn refresh_generation(&self, generation: u64, silent: bool) -> Result<(), FetchError> {
        let session = {
            let state = self.lock_state();
            if state.generation != generation {
                debug!("Refresh skipped: generation {} has ended", generation);
                return Ok(());
            }
            match state.session.clone() {
                Some(session) => session,
                None => {
                    debug!("Refresh skipped: no active session");
                    return Ok(());
                }
            }
        };

        let _busy = BusyGuard::acquire(self, generation, silent);
        self.events.emit(SyncEvent::RefreshStarted { silent });

        let fetched = futures::future::try_join(
            self.source.fetch_positions(&session),
            self.source.fetch_lots(&session),
        )
        .await;

        match fetched {
            Ok((positions, lots)) => {
                let counts = (positions.len(), lots.len());
                let applied = self.apply(generation, |snapshot| {
                    snapshot.positions = positions;
                    snapshot.lots = lots;
                    snapshot.error = None;
                    snapshot.last_synced_at = Some(Utc::now());
                    true
                });

                if applied {
                    debug!(
                        "Portfolio refreshed: {} position(s), {} lot(s)",
                        counts.0, counts.1
                    );
                    self.events.emit(SyncEvent::RefreshCompleted {
                        silent,
                        positions: counts.0,
                        lots: counts.1,
                    });
                } else {
                    debug!("Discarding refresh result for a session that has ended");
                }
                Ok(())
            }
            Err(err) => {
                let message = err.user_message();
                warn!("Portfolio refresh failed: {}", message);
                let applied = self.apply(generation, |snapshot| {
                    snapshot.error = Some(message.clone());
                    true
                });
                if applied {
                    self.events
                        .emit(SyncEvent::RefreshFailed { silent, message });
                }
                Err(err)
            }
        }
    }

    /// Mutates the snapshot if `generation` is still current. Returns whether
    /// the mutation was applied.
    fn apply(&self, generation: u64, modify: impl FnOnce(&mut Snapshot) -> bool) -> bool {
        let state = self.lock_state();
        if state.generation != generation || state.session.is_none() {
            return false;
        }
        self.snapshot.send_if_modified(modify);
        true
    }
}

/// Raises `loading` or `syncing` for the duration of a refresh.
struct BusyGuard<'a> {
    store: &'a SnapshotStore,
    generation: u64,
    silent: bool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(store: &'a SnapshotStore, generation: u64, silent: bool) -> Self {
        store.apply(generation, |snapshot| set_busy(snapshot, silent, true));
        Self {
            store,
            generation,
            silent,
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let silent = self.silent;
        self.store
            .apply(self.generation, |snapshot| set_busy(snapshot, silent, false));
    }
}

fn set_busy(snapshot: &mut Snapshot, silent: bool, busy: bool) -> bool {
    let flag = if silent {
        &mut snapshot.syncing
    } else {
        &mut snapshot.loading
    };
    let changed = *flag != busy;
    *flag = busy;
    changed
}
