//! Portfolio API client for the REST backend.
//!
//! Every request carries the session's access token as a bearer token.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use std::time::Duration;

use folio_sync_core::errors::FetchError;
use folio_sync_core::{Lot, PortfolioDataSource, Position, Session};

use crate::error::{ApiClientError, Result};
use crate::types::*;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const NOT_AUTHENTICATED: &str = "Not authenticated. Please sign in again.";

/// Client for the portfolio REST API.
#[derive(Debug, Clone)]
pub struct PortfolioApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl PortfolioApiClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the API. Trailing slashes are ignored; an
    ///   empty value means paths are requested as-is.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create headers for an API request.
    fn headers(&self, token: &str) -> Result<HeaderMap> {
        if token.trim().is_empty() {
            return Err(ApiClientError::auth(NOT_AUTHENTICATED));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiClientError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ApiClientError::api(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to deserialize response. Body: {}, Error: {}", body, e);
            ApiClientError::from(e)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Portfolio
    // ─────────────────────────────────────────────────────────────────────────

    /// Aggregated positions, sorted by symbol.
    ///
    /// GET /api/v1/positions
    pub async fn list_positions(&self, token: &str) -> Result<Vec<Position>> {
        let response = self
            .client
            .get(self.url("/api/v1/positions"))
            .headers(self.headers(token)?)
            .send()
            .await?;

        let rows: Vec<PositionRow> = Self::parse_response(response).await?;
        let mut positions: Vec<Position> = rows.into_iter().map(Position::from).collect();
        sort_by_symbol(&mut positions);
        debug!("Fetched {} position(s)", positions.len());
        Ok(positions)
    }

    /// Purchase lots in server order.
    ///
    /// GET /api/v1/lots
    pub async fn list_lots(&self, token: &str) -> Result<Vec<Lot>> {
        let response = self
            .client
            .get(self.url("/api/v1/lots"))
            .headers(self.headers(token)?)
            .send()
            .await?;

        let rows: Vec<LotRow> = Self::parse_response(response).await?;
        debug!("Fetched {} lot(s)", rows.len());
        Ok(rows.into_iter().map(Lot::from).collect())
    }
}

#[async_trait]
impl PortfolioDataSource for PortfolioApiClient {
    async fn fetch_positions(&self, session: &Session) -> std::result::Result<Vec<Position>, FetchError> {
        self.list_positions(&session.access_token)
            .await
            .map_err(FetchError::from)
    }

    async fn fetch_lots(&self, session: &Session) -> std::result::Result<Vec<Lot>, FetchError> {
        self.list_lots(&session.access_token)
            .await
            .map_err(FetchError::from)
    }
}

/// Message for a failed response: the body's `error` field when present,
/// otherwise the status text.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorResponse>(body) {
        if let Some(error) = payload.error.filter(|e| !e.trim().is_empty()) {
            return error;
        }
    }

    match status.canonical_reason() {
        Some(reason) => reason.to_string(),
        None => format!("Request failed ({})", status.as_u16()),
    }
}

fn sort_by_symbol(positions: &mut [Position]) {
    positions.sort_by(|a, b| {
        a.symbol
            .to_lowercase()
            .cmp(&b.symbol.to_lowercase())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_sync_core::AssetType;
    use rust_decimal::Decimal;

    fn position(symbol: &str) -> Position {
        Position {
            asset_id: 1,
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            asset_type: AssetType::Stock,
            total_qty: Decimal::ONE,
            avg_cost: Decimal::ONE,
            current_price: None,
            unrealized_pl: None,
        }
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = PortfolioApiClient::new(" https://api.example.com// ").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(
            client.url("/api/v1/lots"),
            "https://api.example.com/api/v1/lots"
        );

        let relative = PortfolioApiClient::new("").unwrap();
        assert_eq!(relative.url("/api/v1/lots"), "/api/v1/lots");
    }

    #[test]
    fn test_headers_require_token() {
        let client = PortfolioApiClient::new("http://localhost").unwrap();

        let err = client.headers("  ").unwrap_err();
        assert!(matches!(err, ApiClientError::Auth(_)));

        let headers = client.headers("abc").unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer abc");
        assert_eq!(headers[ACCEPT], "application/json");

        let err = client.headers("bad\ntoken").unwrap_err();
        assert!(matches!(err, ApiClientError::Auth(_)));
    }

    #[test]
    fn test_error_message_prefers_body() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"quantity must be positive"}"#),
            "quantity must be positive"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error":"  "}"#),
            "Bad Request"
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>"),
            "Internal Server Error"
        );
        assert_eq!(
            error_message(StatusCode::from_u16(599).unwrap(), ""),
            "Request failed (599)"
        );
    }

    #[test]
    fn test_positions_sort_by_symbol_case_insensitive() {
        let mut positions = vec![position("eth"), position("BTC"), position("AAPL")];
        sort_by_symbol(&mut positions);

        let symbols: Vec<&str> = positions.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "BTC", "eth"]);
    }

    #[tokio::test]
    async fn test_empty_token_fails_before_request() {
        let client = PortfolioApiClient::new("http://127.0.0.1:9").unwrap();
        let session = Session::new("user-1", "");

        let err = client.fetch_positions(&session).await.unwrap_err();
        assert_eq!(err, FetchError::auth(NOT_AUTHENTICATED));
    }
}
