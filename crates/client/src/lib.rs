//! Folio Sync Client - REST data source for the portfolio sync core.
//!
//! Implements `PortfolioDataSource` over the read endpoints of the portfolio
//! HTTP API.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use folio_sync_client::PortfolioApiClient;
//! use folio_sync_core::{SyncConfig, SyncCoordinator};
//! use folio_sync_core::sync::NoopTransport;
//!
//! let client = Arc::new(PortfolioApiClient::new("https://api.example.com")?);
//! let coordinator = SyncCoordinator::new(SyncConfig::default(), client, Arc::new(NoopTransport));
//! ```

mod client;
mod error;
mod types;

pub use client::PortfolioApiClient;
pub use error::{ApiClientError, Result};
pub use types::*;
