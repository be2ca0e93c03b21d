//! Sync event types.

use serde::{Deserialize, Serialize};

use crate::sync::ConnectivityStatus;

/// Canonical event names for hosts that forward events by name.
pub const PORTFOLIO_SYNC_START: &str = "portfolio:sync-start";
pub const PORTFOLIO_SYNC_COMPLETE: &str = "portfolio:sync-complete";
pub const PORTFOLIO_SYNC_ERROR: &str = "portfolio:sync-error";
pub const REALTIME_STATUS: &str = "realtime:status";

/// Facts about the sync lifecycle, emitted after they happen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A refresh started fetching.
    RefreshStarted { silent: bool },

    /// A refresh replaced the snapshot.
    RefreshCompleted {
        silent: bool,
        positions: usize,
        lots: usize,
    },

    /// A refresh failed; the previous snapshot was kept.
    RefreshFailed { silent: bool, message: String },

    /// Connectivity status of the push channel changed.
    StatusChanged { status: ConnectivityStatus },
}

impl SyncEvent {
    /// Name used when the event is forwarded over a named channel.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::RefreshStarted { .. } => PORTFOLIO_SYNC_START,
            SyncEvent::RefreshCompleted { .. } => PORTFOLIO_SYNC_COMPLETE,
            SyncEvent::RefreshFailed { .. } => PORTFOLIO_SYNC_ERROR,
            SyncEvent::StatusChanged { .. } => REALTIME_STATUS,
        }
    }
}
