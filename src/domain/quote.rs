//! Point-in-time quote from the external price service.

/// A resolved (symbol, name, price) answer. Never persisted; fetched once per
/// request and threaded through validation and execution so every step of an
/// order sees the same price.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
}
