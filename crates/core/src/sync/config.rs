//! Timing configuration for the sync components.

use std::time::Duration;

use crate::constants::{
    DEFAULT_DEBOUNCE_WINDOW, DEFAULT_POLL_INTERVAL, DEFAULT_SUBSCRIBE_TIMEOUT, MIN_POLL_INTERVAL,
};

/// Timing knobs for a [`SyncCoordinator`](super::SyncCoordinator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    debounce_window: Duration,
    poll_interval: Duration,
    subscribe_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            poll_interval: DEFAULT_POLL_INTERVAL,
            subscribe_timeout: DEFAULT_SUBSCRIBE_TIMEOUT,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the poll interval. Values below five seconds are raised to five seconds.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_poll_interval(interval);
        self
    }

    pub fn with_subscribe_timeout(mut self, timeout: Duration) -> Self {
        self.subscribe_timeout = timeout;
        self
    }

    pub fn debounce_window(&self) -> Duration {
        self.debounce_window
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn subscribe_timeout(&self) -> Duration {
        self.subscribe_timeout
    }

    /// Poll interval in whole seconds, rounded to nearest.
    pub fn refresh_interval_seconds(&self) -> u64 {
        (self.poll_interval.as_millis() as u64 + 500) / 1000
    }
}

pub fn clamp_poll_interval(interval: Duration) -> Duration {
    interval.max(MIN_POLL_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.debounce_window(), Duration::from_millis(500));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.subscribe_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh_interval_seconds(), 30);
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let config = SyncConfig::new().with_poll_interval(Duration::from_millis(1200));
        assert_eq!(config.poll_interval(), Duration::from_secs(5));

        let config = SyncConfig::new().with_poll_interval(Duration::from_secs(45));
        assert_eq!(config.poll_interval(), Duration::from_secs(45));
    }

    #[test]
    fn test_refresh_interval_seconds_rounds() {
        let config = SyncConfig::new().with_poll_interval(Duration::from_millis(7_600));
        assert_eq!(config.refresh_interval_seconds(), 8);
    }
}
