//! Push subscription lifecycle and connectivity status.
//!
//! One subscription per active session. Change notifications matching the
//! session's channel are forwarded to the debounced invalidator; transport
//! status messages drive [`ConnectivityStatus`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::invalidator::InvalidationNotifier;
use super::transport::{
    ChannelSpec, ChannelStatus, PushTransport, SubscriptionHandle, TransportMessage,
};
use crate::errors::SubscriptionError;
use crate::events::{SyncEvent, SyncEventSink};
use crate::session::Session;

/// Quality of the push channel as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityStatus {
    /// No active session
    #[default]
    Off,
    /// Subscribing, not yet confirmed
    Connecting,
    /// Push notifications are flowing
    Live,
    /// Push failed or timed out; polling still keeps data fresh
    Error,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityStatus::Off => "off",
            ConnectivityStatus::Connecting => "connecting",
            ConnectivityStatus::Live => "live",
            ConnectivityStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status value guarded by a subscription epoch.
///
/// Each `begin()` opens a new epoch. Updates tagged with an older epoch are
/// dropped, so a pump that is being torn down cannot overwrite `off`. The
/// event sink is only called after the epoch lock is released.
struct StatusCell {
    epoch: Mutex<u64>,
    status: watch::Sender<ConnectivityStatus>,
    events: Arc<dyn SyncEventSink>,
}

impl StatusCell {
    fn new(events: Arc<dyn SyncEventSink>) -> Self {
        let (status, _receiver) = watch::channel(ConnectivityStatus::Off);
        Self {
            epoch: Mutex::new(0),
            status,
            events,
        }
    }

    fn lock_epoch(&self) -> MutexGuard<'_, u64> {
        self.epoch.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current(&self) -> ConnectivityStatus {
        *self.status.borrow()
    }

    /// Stores `next`. Returns it when it differs from the previous value.
    fn store(&self, next: ConnectivityStatus) -> Option<ConnectivityStatus> {
        let changed = self.status.send_if_modified(|status| {
            if *status == next {
                return false;
            }
            *status = next;
            true
        });
        changed.then_some(next)
    }

    fn announce(&self, changed: Option<ConnectivityStatus>) {
        if let Some(status) = changed {
            debug!("Realtime status -> {}", status);
            self.events.emit(SyncEvent::StatusChanged { status });
        }
    }

    /// Opens a new epoch in `connecting`.
    fn begin(&self) -> u64 {
        let (epoch, changed) = {
            let mut epoch = self.lock_epoch();
            *epoch += 1;
            (*epoch, self.store(ConnectivityStatus::Connecting))
        };
        self.announce(changed);
        epoch
    }

    /// Closes the current epoch and reports `off`.
    fn reset(&self) {
        let changed = {
            let mut epoch = self.lock_epoch();
            *epoch += 1;
            self.store(ConnectivityStatus::Off)
        };
        self.announce(changed);
    }

    fn set_if_current(&self, epoch: u64, next: ConnectivityStatus) -> bool {
        let changed = {
            let current = self.lock_epoch();
            if *current != epoch {
                return false;
            }
            self.store(next)
        };
        self.announce(changed);
        true
    }
}

/// Opens push subscriptions and owns the connectivity status.
pub struct SubscriptionManager {
    transport: Arc<dyn PushTransport>,
    subscribe_timeout: Duration,
    status: Arc<StatusCell>,
}

impl SubscriptionManager {
    pub fn new(
        transport: Arc<dyn PushTransport>,
        subscribe_timeout: Duration,
        events: Arc<dyn SyncEventSink>,
    ) -> Self {
        Self {
            transport,
            subscribe_timeout,
            status: Arc::new(StatusCell::new(events)),
        }
    }

    pub fn status(&self) -> ConnectivityStatus {
        self.status.current()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectivityStatus> {
        self.status.status.subscribe()
    }

    /// Subscribes to the session's portfolio channel.
    ///
    /// Status moves to `connecting` immediately. A synchronous subscribe
    /// failure moves it to `error` and yields a subscription with nothing to
    /// tear down; the caller keeps polling either way.
    pub fn start(&self, session: &Session, notifier: InvalidationNotifier) -> ActiveSubscription {
        let epoch = self.status.begin();
        let spec = ChannelSpec::portfolio(&session.user_id);
        let (tx, rx) = mpsc::unbounded_channel();

        match self.transport.subscribe(spec.clone(), tx) {
            Ok(handle) => {
                info!("Subscribing to push channel {}", spec.name);
                let pump = tokio::spawn(pump_loop(
                    rx,
                    spec,
                    notifier,
                    self.status.clone(),
                    epoch,
                    self.subscribe_timeout,
                ));
                ActiveSubscription {
                    transport: self.transport.clone(),
                    handle: Mutex::new(Some(handle)),
                    pump: Some(pump),
                }
            }
            Err(err) => {
                warn!("Push subscription failed, relying on polling: {}", err);
                self.status.set_if_current(epoch, ConnectivityStatus::Error);
                ActiveSubscription {
                    transport: self.transport.clone(),
                    handle: Mutex::new(None),
                    pump: None,
                }
            }
        }
    }

    /// Reports `off`. Pending updates from older subscriptions are ignored.
    pub fn mark_off(&self) {
        self.status.reset();
    }
}

/// An open subscription. Stopping or dropping it unsubscribes.
pub struct ActiveSubscription {
    transport: Arc<dyn PushTransport>,
    handle: Mutex<Option<SubscriptionHandle>>,
    pump: Option<JoinHandle<()>>,
}

impl ActiveSubscription {
    pub fn is_subscribed(&self) -> bool {
        self.handle
            .lock()
            .map(|handle| handle.is_some())
            .unwrap_or(false)
    }

    /// Unsubscribes from the transport. Safe to call more than once and
    /// before the channel was ever confirmed.
    pub fn stop(&self) {
        if let Some(pump) = &self.pump {
            pump.abort();
        }
        let handle = self
            .handle
            .lock()
            .map(|mut handle| handle.take())
            .unwrap_or(None);
        if let Some(handle) = handle {
            debug!("Unsubscribing push channel {}", handle);
            self.transport.unsubscribe(&handle);
        }
    }
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump_loop(
    mut rx: mpsc::UnboundedReceiver<TransportMessage>,
    spec: ChannelSpec,
    notifier: InvalidationNotifier,
    status: Arc<StatusCell>,
    epoch: u64,
    subscribe_timeout: Duration,
) {
    let confirm_deadline = tokio::time::sleep(subscribe_timeout);
    tokio::pin!(confirm_deadline);
    let mut awaiting_confirmation = true;

    loop {
        tokio::select! {
            _ = &mut confirm_deadline, if awaiting_confirmation => {
                awaiting_confirmation = false;
                warn!(
                    "Push channel {} not confirmed within {:?}",
                    spec.name, subscribe_timeout
                );
                status.set_if_current(epoch, ConnectivityStatus::Error);
            }
            message = rx.recv() => match message {
                Some(TransportMessage::Status(channel_status)) => {
                    match channel_status {
                        ChannelStatus::Subscribed => {
                            awaiting_confirmation = false;
                            info!("Push channel {} is live", spec.name);
                            status.set_if_current(epoch, ConnectivityStatus::Live);
                        }
                        ChannelStatus::ChannelError(reason) => {
                            awaiting_confirmation = false;
                            warn!("{}", SubscriptionError::Channel(reason));
                            status.set_if_current(epoch, ConnectivityStatus::Error);
                        }
                        ChannelStatus::TimedOut => {
                            awaiting_confirmation = false;
                            warn!("Push channel {}: {}", spec.name, SubscriptionError::TimedOut);
                            status.set_if_current(epoch, ConnectivityStatus::Error);
                        }
                        ChannelStatus::Closed => {
                            debug!("Push channel {} closed by transport", spec.name);
                        }
                    }
                }
                Some(TransportMessage::Change(event)) => {
                    if spec.matches(&event) {
                        notifier.notify();
                    } else {
                        debug!(
                            "Ignoring change on {}.{} outside channel {}",
                            event.schema, event.table, spec.name
                        );
                    }
                }
                None => {
                    // Transport dropped the channel without an explicit status.
                    warn!("Push channel {} dropped by transport", spec.name);
                    status.set_if_current(epoch, ConnectivityStatus::Error);
                    return;
                }
            },
        }
    }
}
