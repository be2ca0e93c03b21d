//! Wire types for the portfolio REST API.
//!
//! Rows are decoded leniently: numeric fields may arrive as JSON numbers or
//! numeric strings, and missing descriptive fields get placeholders.

use std::str::FromStr;

use folio_sync_core::{AssetType, Lot, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const UNKNOWN_ASSET_NAME: &str = "Unknown asset";

// ─────────────────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Row of `GET /api/v1/positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionRow {
    #[serde(deserialize_with = "lenient_id")]
    pub asset_id: i64,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub total_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub avg_cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub current_price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub unrealized_pl: Option<Decimal>,
}

impl From<PositionRow> for Position {
    fn from(row: PositionRow) -> Self {
        Position {
            asset_id: row.asset_id,
            symbol: symbol_or_placeholder(row.symbol, row.asset_id),
            name: name_or_placeholder(row.name),
            asset_type: AssetType::normalize(row.asset_type.as_deref()),
            total_qty: row.total_qty.unwrap_or(Decimal::ZERO),
            avg_cost: row.avg_cost.unwrap_or(Decimal::ZERO),
            current_price: row.current_price,
            unrealized_pl: row.unrealized_pl,
        }
    }
}

/// Row of `GET /api/v1/lots`.
#[derive(Debug, Clone, Deserialize)]
pub struct LotRow {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    #[serde(deserialize_with = "lenient_id")]
    pub asset_id: i64,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub asset_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub quantity: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub purchased_at: String,
}

impl From<LotRow> for Lot {
    fn from(row: LotRow) -> Self {
        Lot {
            id: row.id,
            asset_id: row.asset_id,
            asset_symbol: symbol_or_placeholder(row.symbol, row.asset_id),
            asset_name: name_or_placeholder(row.name),
            asset_type: AssetType::normalize(row.asset_type.as_deref()),
            quantity: row.quantity.unwrap_or(Decimal::ZERO),
            unit_cost: row.unit_cost.unwrap_or(Decimal::ZERO),
            purchased_at: row.purchased_at,
        }
    }
}

/// Error body returned by the API on failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Lenient decoding
// ─────────────────────────────────────────────────────────────────────────────

fn symbol_or_placeholder(symbol: Option<String>, asset_id: i64) -> String {
    symbol.unwrap_or_else(|| format!("#{}", asset_id))
}

fn name_or_placeholder(name: Option<String>) -> String {
    name.unwrap_or_else(|| UNKNOWN_ASSET_NAME.to_string())
}

fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Numbers, numeric strings and null. Anything unparseable becomes `None`.
fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(decimal_from_value))
}

fn lenient_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_position_row_accepts_numbers_and_strings() {
        let row: PositionRow = serde_json::from_value(json!({
            "asset_id": 7,
            "symbol": "BTC",
            "name": "Bitcoin",
            "type": "crypto",
            "total_qty": "0.5",
            "avg_cost": 20000,
            "current_price": 30000.25,
            "unrealized_pl": null
        }))
        .unwrap();

        let position = Position::from(row);
        assert_eq!(position.asset_id, 7);
        assert_eq!(position.total_qty, dec!(0.5));
        assert_eq!(position.avg_cost, dec!(20000));
        assert_eq!(position.current_price, Some(dec!(30000.25)));
        assert_eq!(position.unrealized_pl, None);
        assert_eq!(position.asset_type, AssetType::Crypto);
    }

    #[test]
    fn test_missing_fields_get_placeholders() {
        let row: PositionRow = serde_json::from_value(json!({
            "asset_id": 12,
            "type": "bond",
            "total_qty": "not a number"
        }))
        .unwrap();

        let position = Position::from(row);
        assert_eq!(position.symbol, "#12");
        assert_eq!(position.name, "Unknown asset");
        assert_eq!(position.asset_type, AssetType::Crypto);
        assert_eq!(position.total_qty, Decimal::ZERO);
        assert_eq!(position.avg_cost, Decimal::ZERO);
    }

    #[test]
    fn test_lot_row_maps_to_lot() {
        let row: LotRow = serde_json::from_value(json!({
            "id": "3",
            "asset_id": 1,
            "symbol": "AAPL",
            "name": "Apple",
            "type": "stock",
            "quantity": 1,
            "unit_cost": "100",
            "purchased_at": "2026-01-02T00:00:00Z"
        }))
        .unwrap();

        let lot = Lot::from(row);
        assert_eq!(lot.id, 3);
        assert_eq!(lot.asset_symbol, "AAPL");
        assert_eq!(lot.asset_type, AssetType::Stock);
        assert_eq!(lot.quantity, dec!(1));
        assert_eq!(lot.unit_cost, dec!(100));
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        let result = serde_json::from_value::<LotRow>(json!({ "id": "abc", "asset_id": 1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_scientific_notation_decodes() {
        assert_eq!(decimal_from_value(&json!("1e-3")), Some(dec!(0.001)));
        assert_eq!(decimal_from_value(&json!(true)), None);
    }
}
