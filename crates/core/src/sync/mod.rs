//! Snapshot synchronization: store, triggers and their lifecycle.

mod config;
mod coordinator;
mod invalidator;
mod poller;
mod snapshot;
mod subscription;
mod transport;
mod worker;

pub use config::*;
pub use coordinator::*;
pub use invalidator::{DebouncedInvalidator, InvalidationNotifier};
pub use poller::*;
pub use snapshot::*;
pub use subscription::*;
pub use transport::*;
pub use worker::*;

#[cfg(test)]
mod test_support;
