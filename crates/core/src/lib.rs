//! Folio Sync Core - portfolio snapshot synchronization.
//!
//! This crate keeps a local snapshot of a user's positions and lots consistent
//! with a remote source of truth. It combines a push channel (debounced) with a
//! polling backstop and guarantees that refreshes never overlap.
//!
//! Data access and the push transport are traits implemented elsewhere
//! (see the `folio-sync-client` crate for the REST data source).

pub mod constants;
pub mod errors;
pub mod events;
pub mod portfolio;
pub mod session;
pub mod sync;

pub use portfolio::*;
pub use session::{Session, SessionHandle};
pub use sync::{ConnectivityStatus, Snapshot, SyncConfig, SyncCoordinator};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
