use std::time::Duration;

/// Delay between the first push notification of a burst and the batched refresh
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Poll interval used when none is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Lower bound for the poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long to wait for the transport to confirm a subscription
pub const DEFAULT_SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Table holding the user's purchase lots
pub const LOTS_TABLE: &str = "lots";

/// Shared table holding the latest price per asset
pub const PRICES_TABLE: &str = "prices_current";

/// Prefix of the per-user push channel name
pub const CHANNEL_PREFIX: &str = "portfolio-sync";

/// Fallback message when a fetch failure carries no text
pub const DEFAULT_FETCH_ERROR_MESSAGE: &str = "Failed loading portfolio data.";
