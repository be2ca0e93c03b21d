use async_trait::async_trait;

use super::{Lot, Position};
use crate::errors::FetchError;
use crate::session::Session;

/// Read access to the remote portfolio.
///
/// Both reads are idempotent and side-effect free. The session carries the
/// credentials the implementation authenticates with.
#[async_trait]
pub trait PortfolioDataSource: Send + Sync {
    async fn fetch_positions(&self, session: &Session) -> Result<Vec<Position>, FetchError>;

    async fn fetch_lots(&self, session: &Session) -> Result<Vec<Lot>, FetchError>;
}
