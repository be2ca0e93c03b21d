use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Crypto,
    Stock,
}

impl AssetType {
    /// Maps a raw API value onto a known asset type. Anything that is not a
    /// stock is treated as crypto.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case("stock") => AssetType::Stock,
            _ => AssetType::Crypto,
        }
    }
}

/// Aggregate of all lots of one asset, priced with the latest known price.
///
/// Computed by the remote side; the sync core only stores it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub asset_id: i64,
    pub symbol: String,
    pub name: String,
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub total_qty: Decimal,
    pub avg_cost: Decimal,
    pub current_price: Option<Decimal>,
    #[serde(rename = "unrealizedPL")]
    pub unrealized_pl: Option<Decimal>,
}

/// A single purchase record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: i64,
    pub asset_id: i64,
    pub asset_symbol: String,
    pub asset_name: String,
    pub asset_type: AssetType,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// RFC 3339 timestamp as returned by the API
    pub purchased_at: String,
}
