//! Ledger store port trait.

use chrono::{DateTime, Utc};

use crate::domain::account::UserAccount;
use crate::domain::error::PapertradeError;
use crate::domain::quote::Quote;
use crate::domain::trade::{HoldingRow, TradeDirection, TradeRecord};

/// Durable state: users, holdings, and the append-only transaction log.
pub trait LedgerStorePort {
    /// Insert a new user. Maps a duplicate username to
    /// [`PapertradeError::UsernameTaken`].
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        starting_cash: f64,
    ) -> Result<UserAccount, PapertradeError>;

    fn user_by_username(&self, username: &str) -> Result<Option<UserAccount>, PapertradeError>;

    fn user_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, PapertradeError>;

    /// Current holdings for a user, alphabetical by symbol, with display
    /// names recovered from the transaction history.
    fn holdings(&self, user_id: i64) -> Result<Vec<HoldingRow>, PapertradeError>;

    /// Full transaction log for a user, oldest first.
    fn transactions(&self, user_id: i64) -> Result<Vec<TradeRecord>, PapertradeError>;

    /// Apply one order atomically: re-check affordability (buy) or holding
    /// sufficiency (sell) under the store's write lock, then insert the
    /// transaction row, adjust the holding, and adjust cash. All effects
    /// commit together or not at all.
    ///
    /// Fails with [`PapertradeError::InsufficientFunds`] or
    /// [`PapertradeError::InsufficientShares`] without any state change.
    fn execute_trade(
        &self,
        user_id: i64,
        direction: TradeDirection,
        quote: &Quote,
        shares: i64,
        executed_at: DateTime<Utc>,
    ) -> Result<(), PapertradeError>;
}
