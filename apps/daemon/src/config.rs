use std::time::Duration;

use folio_sync_core::errors::ConfigurationError;
use folio_sync_core::{Session, SyncConfig};

pub const API_BASE_URL: &str = "FOLIO_API_BASE_URL";
pub const ACCESS_TOKEN: &str = "FOLIO_ACCESS_TOKEN";
pub const USER_ID: &str = "FOLIO_USER_ID";
pub const REFRESH_MS: &str = "FOLIO_REFRESH_MS";
pub const DEBOUNCE_MS: &str = "FOLIO_DEBOUNCE_MS";
pub const SUBSCRIBE_TIMEOUT_MS: &str = "FOLIO_SUBSCRIBE_TIMEOUT_MS";

pub struct Config {
    pub api_base_url: String,
    pub user_id: String,
    pub access_token: String,
    pub sync: SyncConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigurationError::MissingKey(key.to_string()))
        };
        let millis = |key: &str| -> Result<Option<Duration>, ConfigurationError> {
            match lookup(key).map(|value| value.trim().to_string()) {
                None => Ok(None),
                Some(value) if value.is_empty() => Ok(None),
                Some(value) => value
                    .parse::<u64>()
                    .map(|ms| Some(Duration::from_millis(ms)))
                    .map_err(|e| ConfigurationError::invalid(key, e.to_string())),
            }
        };

        let mut sync = SyncConfig::default();
        if let Some(interval) = millis(REFRESH_MS)? {
            sync = sync.with_poll_interval(interval);
        }
        if let Some(window) = millis(DEBOUNCE_MS)? {
            sync = sync.with_debounce_window(window);
        }
        if let Some(timeout) = millis(SUBSCRIBE_TIMEOUT_MS)? {
            sync = sync.with_subscribe_timeout(timeout);
        }

        Ok(Self {
            api_base_url: required(API_BASE_URL)?,
            user_id: required(USER_ID)?,
            access_token: required(ACCESS_TOKEN)?,
            sync,
        })
    }

    pub fn session(&self) -> Session {
        Session::new(self.user_id.clone(), self.access_token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        (API_BASE_URL, "https://api.example.com"),
        (USER_ID, "user-1"),
        (ACCESS_TOKEN, "secret"),
    ];

    #[test]
    fn test_defaults_when_only_required_keys_set() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.session(), Session::new("user-1", "secret"));
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn test_missing_required_key() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).err().unwrap();
        assert!(matches!(err, ConfigurationError::MissingKey(key) if key == ACCESS_TOKEN));

        let mut blank = REQUIRED.to_vec();
        blank[1] = (USER_ID, "  ");
        let err = Config::from_lookup(lookup(&blank)).err().unwrap();
        assert!(matches!(err, ConfigurationError::MissingKey(key) if key == USER_ID));
    }

    #[test]
    fn test_intervals_are_read_and_clamped() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((REFRESH_MS, "1000"));
        pairs.push((DEBOUNCE_MS, "250"));
        pairs.push((SUBSCRIBE_TIMEOUT_MS, "4000"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.sync.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.sync.debounce_window(), Duration::from_millis(250));
        assert_eq!(config.sync.subscribe_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push((REFRESH_MS, "soon"));
        let err = Config::from_lookup(lookup(&pairs)).err().unwrap();
        assert!(matches!(err, ConfigurationError::InvalidValue { key, .. } if key == REFRESH_MS));
    }
}
