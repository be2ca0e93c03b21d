//! Portfolio read models and the data-access seam used by the snapshot store.

mod portfolio_model;
mod portfolio_traits;

pub use portfolio_model::*;
pub use portfolio_traits::*;
