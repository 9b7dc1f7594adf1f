//! Ledger operations: order validation, execution, and portfolio valuation.
//!
//! Validation is first-failure-wins: symbol resolution, then share count,
//! then affordability or holding sufficiency. The final checks run inside the
//! store's trade transaction so a rejected order changes no state even under
//! concurrent requests.

use chrono::Utc;

use crate::ports::ledger_port::LedgerStorePort;
use crate::ports::quote_port::QuotePort;

use super::account::UserAccount;
use super::credentials;
use super::error::PapertradeError;
use super::quote::Quote;
use super::trade::{TradeDirection, TradeRecord};

/// Upper bound on shares per order; keeps `quantity * price` inside the range
/// where f64 arithmetic on cents stays exact.
const MAX_SHARES_PER_ORDER: i64 = 1_000_000_000;

/// One row of the portfolio view: a held symbol priced at the current quote.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionView {
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub price: f64,
    pub value: f64,
}

/// Snapshot of a user's financial position: cash, priced holdings, and
/// `grand_total = cash + Σ quantity · price`.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioView {
    pub cash: f64,
    pub positions: Vec<PositionView>,
    pub grand_total: f64,
}

/// Parse a submitted share count.
///
/// Any numeric string with no fractional part is accepted (`"10"`, `"10.0"`,
/// `"1e2"`); everything else is rejected, as are zero, negatives, and values
/// beyond [`MAX_SHARES_PER_ORDER`].
pub fn parse_share_count(raw: &str) -> Result<i64, PapertradeError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PapertradeError::MissingField {
            field: "shares".into(),
        });
    }
    let invalid = || PapertradeError::InvalidShares {
        value: raw.to_string(),
    };
    let value: f64 = trimmed.parse().map_err(|_| invalid())?;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(invalid());
    }
    if value < 1.0 || value > MAX_SHARES_PER_ORDER as f64 {
        return Err(invalid());
    }
    Ok(value as i64)
}

/// Normalize and resolve a symbol through the quote port. One lookup per
/// order; the returned quote is reused for every later step.
pub async fn resolve_quote(
    quotes: &dyn QuotePort,
    symbol: &str,
) -> Result<Quote, PapertradeError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(PapertradeError::MissingField {
            field: "symbol".into(),
        });
    }
    quotes
        .lookup(&symbol)
        .await
        .ok_or(PapertradeError::UnknownSymbol { symbol })
}

/// Execute a purchase for `user_id`. On success exactly one transaction row
/// is appended, the holding is created or incremented, and cash is debited
/// by `price * shares`.
pub async fn buy(
    store: &dyn LedgerStorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
    symbol: &str,
    shares: &str,
) -> Result<(), PapertradeError> {
    let quote = resolve_quote(quotes, symbol).await?;
    let shares = parse_share_count(shares)?;
    store.execute_trade(user_id, TradeDirection::Buy, &quote, shares, Utc::now())
}

/// Execute a sale for `user_id`. On success exactly one transaction row is
/// appended, the holding is decremented (and removed at quantity 0), and
/// cash is credited by `price * shares`.
pub async fn sell(
    store: &dyn LedgerStorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
    symbol: &str,
    shares: &str,
) -> Result<(), PapertradeError> {
    let quote = resolve_quote(quotes, symbol).await?;
    let shares = parse_share_count(shares)?;
    store.execute_trade(user_id, TradeDirection::Sell, &quote, shares, Utc::now())
}

/// Price every current holding and total the account. Read-only.
pub async fn portfolio(
    store: &dyn LedgerStorePort,
    quotes: &dyn QuotePort,
    user_id: i64,
) -> Result<PortfolioView, PapertradeError> {
    let user = store
        .user_by_id(user_id)?
        .ok_or(PapertradeError::UnknownUser { user_id })?;

    let holdings = store.holdings(user_id)?;
    let mut positions = Vec::with_capacity(holdings.len());
    let mut grand_total = user.cash;

    for holding in holdings {
        let quote = quotes.lookup(&holding.symbol).await.ok_or_else(|| {
            PapertradeError::UnknownSymbol {
                symbol: holding.symbol.clone(),
            }
        })?;
        let value = quote.price * holding.quantity as f64;
        grand_total += value;
        positions.push(PositionView {
            symbol: holding.symbol,
            name: holding.name,
            quantity: holding.quantity,
            price: quote.price,
            value,
        });
    }

    Ok(PortfolioView {
        cash: user.cash,
        positions,
        grand_total,
    })
}

/// The full transaction log for a user, oldest first.
pub fn history(
    store: &dyn LedgerStorePort,
    user_id: i64,
) -> Result<Vec<TradeRecord>, PapertradeError> {
    store.transactions(user_id)
}

/// Register a new user with the configured starting cash balance.
///
/// Duplicate usernames surface as [`PapertradeError::UsernameTaken`] from the
/// store's uniqueness constraint, so two racing registrations cannot both
/// succeed.
pub fn register(
    store: &dyn LedgerStorePort,
    starting_cash: f64,
    username: &str,
    password: &str,
    confirmation: &str,
) -> Result<UserAccount, PapertradeError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(PapertradeError::MissingField {
            field: "username".into(),
        });
    }
    if password.is_empty() {
        return Err(PapertradeError::MissingField {
            field: "password".into(),
        });
    }
    if password != confirmation {
        return Err(PapertradeError::PasswordMismatch);
    }
    let password_hash = credentials::hash_password(password)?;
    store.create_user(username, &password_hash, starting_cash)
}

/// Check submitted credentials against the stored hash.
///
/// Every failure mode (missing field, unknown username, wrong password)
/// collapses to the same [`PapertradeError::InvalidCredentials`] so the
/// caller cannot learn which part was wrong.
pub fn authenticate(
    store: &dyn LedgerStorePort,
    username: &str,
    password: &str,
) -> Result<UserAccount, PapertradeError> {
    if username.is_empty() || password.is_empty() {
        return Err(PapertradeError::InvalidCredentials);
    }
    let user = store
        .user_by_username(username)?
        .ok_or(PapertradeError::InvalidCredentials)?;
    if credentials::verify_password(password, &user.password_hash) {
        Ok(user)
    } else {
        Err(PapertradeError::InvalidCredentials)
    }
}
