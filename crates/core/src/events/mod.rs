//! Sync lifecycle events.
//!
//! The coordinator reports refresh and connectivity transitions through a
//! [`SyncEventSink`]. Hosts implement the sink to forward events to their
//! presentation layer.

mod sink;
mod sync_event;

pub use sink::*;
pub use sync_event::*;
