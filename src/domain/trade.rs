//! Trade and holding records.

use chrono::{DateTime, Utc};

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(TradeDirection::Buy),
            "sell" => Some(TradeDirection::Sell),
            _ => None,
        }
    }
}

/// One row of the append-only transaction log. The price is the unit price
/// at the time the order executed.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: i64,
    pub user_id: i64,
    pub direction: TradeDirection,
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
}

/// A currently-held position: quantity of one symbol owned by one user.
/// `name` is the display name recovered from the transaction history.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldingRow {
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
}
