//! Refresh worker: the single consumer of refresh triggers for a session.
//!
//! Push notifications, poll ticks and manual refreshes all post a request to
//! this worker. Requests that arrive while a refresh is running are coalesced
//! into one follow-up refresh, so fetches never overlap and no trigger is lost.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::snapshot::SnapshotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RefreshRequest {
    silent: bool,
}

/// Cloneable handle used to request a refresh.
#[derive(Debug, Clone)]
pub struct RefreshTrigger {
    tx: mpsc::UnboundedSender<RefreshRequest>,
}

impl RefreshTrigger {
    /// Requests a refresh. Returns false once the worker has stopped.
    pub fn request(&self, silent: bool) -> bool {
        self.tx.send(RefreshRequest { silent }).is_ok()
    }

    /// Requests a background refresh (raises `syncing`).
    pub fn silent(&self) -> bool {
        self.request(true)
    }

    /// Requests a foreground refresh (raises `loading`).
    pub fn blocking(&self) -> bool {
        self.request(false)
    }
}

/// Owns the worker task. Dropping it stops the worker.
///
/// A worker serves exactly one store generation. Once the store moves on to
/// another session, requests still queued here complete without fetching.
#[derive(Debug)]
pub struct RefreshWorker {
    generation: u64,
    handle: JoinHandle<()>,
}

impl RefreshWorker {
    /// Spawns the worker for `generation` of `store` and returns the trigger
    /// feeding it.
    pub fn spawn(store: Arc<SnapshotStore>, generation: u64) -> (RefreshTrigger, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(refresh_worker_loop(rx, store, generation));
        (RefreshTrigger { tx }, Self { generation, handle })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn refresh_worker_loop(
    mut rx: mpsc::UnboundedReceiver<RefreshRequest>,
    store: Arc<SnapshotStore>,
    generation: u64,
) {
    debug!("Refresh worker started for generation {}", generation);

    while let Some(first) = rx.recv().await {
        let mut silent = first.silent;
        let mut coalesced = 0usize;

        // Everything queued while the previous refresh ran folds into this one.
        while let Ok(next) = rx.try_recv() {
            silent &= next.silent;
            coalesced += 1;
        }

        if coalesced > 0 {
            debug!(
                "Coalesced {} queued refresh request(s) into one (silent={})",
                coalesced, silent
            );
        }

        if let Err(err) = store.refresh_generation(generation, silent).await {
            // Already recorded on the snapshot; the next trigger retries.
            warn!("Refresh failed: {}", err);
        }
    }

    debug!("Refresh worker shutting down");
}
