//! Core error types for portfolio synchronization.
//!
//! Runtime failures (fetch, subscription) are converted into observable state by
//! the sync components and never escape the coordinator. Configuration errors are
//! fatal and surfaced once at startup.

use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the sync core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Portfolio refresh failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Push subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Failure while loading positions or lots from the data source.
///
/// Recovered locally: the message is stored on the snapshot and the previous
/// collections are kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network-level failure (connection refused, timeout, TLS, ...).
    #[error("{0}")]
    Transport(String),

    /// Missing or rejected credentials.
    #[error("{0}")]
    Auth(String),

    /// The API answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("{0}")]
    Decode(String),
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Human-readable message stored on the snapshot.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            crate::constants::DEFAULT_FETCH_ERROR_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Failure of the push channel. Degrades connectivity status; polling continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("channel error: {0}")]
    Channel(String),

    #[error("subscription timed out")]
    TimedOut,

    #[error("push transport unavailable: {0}")]
    Unavailable(String),
}

/// Missing or invalid startup configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigurationError {
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
