//! Price lookup port trait.

use async_trait::async_trait;

use crate::domain::quote::Quote;

/// Resolves a ticker symbol to a point-in-time quote.
///
/// Returns `None` for unknown symbols and for any lookup failure (network,
/// malformed response); callers treat absence as "symbol invalid". The call
/// never raises.
#[async_trait]
pub trait QuotePort: Send + Sync {
    async fn lookup(&self, symbol: &str) -> Option<Quote>;
}
