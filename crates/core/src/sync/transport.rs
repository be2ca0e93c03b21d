//! Push transport seam.
//!
//! The transport (a hosted realtime service in production) is an external
//! collaborator. It receives a [`ChannelSpec`] and a sender, and posts
//! [`TransportMessage`]s onto that sender from whatever thread it runs on.
//! The subscription manager consumes them on its own task.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::constants::{CHANNEL_PREFIX, LOTS_TABLE, PRICES_TABLE};
use crate::errors::SubscriptionError;

const DEFAULT_SCHEMA: &str = "public";

/// Equality filter on a row column, rendered as `column=eq.value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// One class of row changes a channel listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFilter {
    pub schema: String,
    pub table: String,
    pub filter: Option<RowFilter>,
}

impl TopicFilter {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some(RowFilter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.schema != self.schema || event.table != self.table {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => event.column(&filter.column).as_deref() == Some(filter.value.as_str()),
        }
    }
}

/// A named channel and the topics it listens to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub topics: Vec<TopicFilter>,
}

impl ChannelSpec {
    /// Channel for one user's portfolio: their own lots plus the shared
    /// current-price feed.
    pub fn portfolio(user_id: &str) -> Self {
        Self {
            name: format!("{}:{}", CHANNEL_PREFIX, user_id),
            topics: vec![
                TopicFilter::table(LOTS_TABLE).with_filter("user_id", user_id),
                TopicFilter::table(PRICES_TABLE),
            ],
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.topics.iter().any(|topic| topic.matches(event))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row mutation delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub schema: String,
    pub table: String,
    pub kind: ChangeKind,
    /// New row for inserts and updates, old row for deletes
    pub record: Value,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, kind: ChangeKind, record: Value) -> Self {
        Self {
            schema: DEFAULT_SCHEMA.to_string(),
            table: table.into(),
            kind,
            record,
        }
    }

    /// Column value rendered as text, for filter comparison.
    pub fn column(&self, name: &str) -> Option<String> {
        match self.record.get(name)? {
            Value::String(value) => Some(value.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Subscription state reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError(String),
    TimedOut,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportMessage {
    Status(ChannelStatus),
    Change(ChangeEvent),
}

/// Opaque identifier of an open subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A realtime messaging service.
///
/// `subscribe` must not block; status and change messages are posted to
/// `sink` asynchronously. `unsubscribe` must be safe to call for a channel
/// that never confirmed.
pub trait PushTransport: Send + Sync {
    fn subscribe(
        &self,
        spec: ChannelSpec,
        sink: mpsc::UnboundedSender<TransportMessage>,
    ) -> Result<SubscriptionHandle, SubscriptionError>;

    fn unsubscribe(&self, handle: &SubscriptionHandle);
}

/// Transport for hosts without push delivery. Every subscribe fails, which
/// leaves the coordinator on polling alone.
#[derive(Debug, Clone, Default)]
pub struct NoopTransport;

impl PushTransport for NoopTransport {
    fn subscribe(
        &self,
        spec: ChannelSpec,
        _sink: mpsc::UnboundedSender<TransportMessage>,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        debug!("No push transport configured for channel {}", spec.name);
        Err(SubscriptionError::Unavailable(
            "push transport not configured".to_string(),
        ))
    }

    fn unsubscribe(&self, _handle: &SubscriptionHandle) {}
}

/// In-process transport. Routes published changes to every subscribed
/// channel whose topics match. Useful for embedding and tests.
#[derive(Debug)]
pub struct LocalTransport {
    auto_confirm: bool,
    channels: Mutex<HashMap<SubscriptionHandle, LocalChannel>>,
}

#[derive(Debug)]
struct LocalChannel {
    spec: ChannelSpec,
    sink: mpsc::UnboundedSender<TransportMessage>,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransport {
    /// Confirms every subscription immediately.
    pub fn new() -> Self {
        Self {
            auto_confirm: true,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Leaves subscriptions unconfirmed until [`report`](Self::report) is called.
    pub fn manual() -> Self {
        Self {
            auto_confirm: false,
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock_channels(&self) -> MutexGuard<'_, HashMap<SubscriptionHandle, LocalChannel>> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Delivers a change to matching channels. Returns the number of channels reached.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let channels = self.lock_channels();
        channels
            .values()
            .filter(|channel| channel.spec.matches(&event))
            .filter(|channel| {
                channel
                    .sink
                    .send(TransportMessage::Change(event.clone()))
                    .is_ok()
            })
            .count()
    }

    /// Reports a status to every open channel.
    pub fn report(&self, status: ChannelStatus) {
        for channel in self.lock_channels().values() {
            let _ = channel.sink.send(TransportMessage::Status(status.clone()));
        }
    }

    pub fn channel_count(&self) -> usize {
        self.lock_channels().len()
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.lock_channels()
            .values()
            .map(|channel| channel.spec.name.clone())
            .collect()
    }
}

impl PushTransport for LocalTransport {
    fn subscribe(
        &self,
        spec: ChannelSpec,
        sink: mpsc::UnboundedSender<TransportMessage>,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        let handle = SubscriptionHandle::new();
        if self.auto_confirm {
            let _ = sink.send(TransportMessage::Status(ChannelStatus::Subscribed));
        }
        self.lock_channels()
            .insert(handle.clone(), LocalChannel { spec, sink });
        Ok(handle)
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.lock_channels().remove(handle);
    }
}
