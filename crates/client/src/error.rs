//! Error types for the portfolio API client.

use folio_sync_core::errors::FetchError;
use thiserror::Error;

/// Result type alias for API client operations.
pub type Result<T> = std::result::Result<T, ApiClientError>;

/// Errors that can occur while talking to the portfolio API.
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response. The message is already user-facing.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Authentication error (missing or malformed token)
    #[error("{0}")]
    Auth(String),
}

impl ApiClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Http(err) if err.is_decode() => FetchError::Decode(err.to_string()),
            ApiClientError::Http(err) => FetchError::transport(err.to_string()),
            ApiClientError::Json(err) => FetchError::Decode(err.to_string()),
            ApiClientError::Api { status, message } => FetchError::api(status, message),
            ApiClientError::Auth(message) => FetchError::auth(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_message_and_status() {
        let err = ApiClientError::api(404, "lot not found");
        assert_eq!(err.to_string(), "lot not found");
        assert_eq!(err.status(), Some(404));

        let fetch: FetchError = err.into();
        assert_eq!(fetch, FetchError::api(404, "lot not found"));
        assert_eq!(fetch.user_message(), "lot not found");
    }

    #[test]
    fn test_auth_and_json_errors_convert() {
        let fetch: FetchError = ApiClientError::auth("Not authenticated").into();
        assert_eq!(fetch, FetchError::auth("Not authenticated"));

        let json_err = serde_json::from_str::<Vec<i64>>("{").unwrap_err();
        let fetch: FetchError = ApiClientError::from(json_err).into();
        assert!(matches!(fetch, FetchError::Decode(_)));
    }
}
