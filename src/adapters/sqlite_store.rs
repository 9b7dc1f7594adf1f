//! SQLite ledger store adapter.
//!
//! All trade mutations run inside a single `BEGIN IMMEDIATE` transaction:
//! the write lock is taken before the affordability / sufficiency re-check,
//! so two conflicting orders for the same account serialize and the loser is
//! rejected against post-commit state.

use chrono::{DateTime, NaiveDateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::domain::account::UserAccount;
use crate::domain::error::PapertradeError;
use crate::domain::quote::Quote;
use crate::domain::trade::{HoldingRow, TradeDirection, TradeRecord};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerStorePort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct SqliteLedgerStore {
    pool: Pool<SqliteConnectionManager>,
}

fn configure_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(Duration::from_millis(5000))?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

impl SqliteLedgerStore {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertradeError> {
        let db_path =
            config
                .get_string("database", "path")
                .ok_or_else(|| PapertradeError::ConfigMissing {
                    section: "database".into(),
                    key: "path".into(),
                })?;
        let pool_size = config.get_int("database", "pool_size", 4) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, PapertradeError> {
        let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    /// Single-connection private in-memory database, for tests.
    pub fn in_memory() -> Result<Self, PapertradeError> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), PapertradeError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                cash REAL NOT NULL
            );
            CREATE TABLE IF NOT EXISTS holdings (
                user_id INTEGER NOT NULL REFERENCES users(id),
                symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity >= 0),
                PRIMARY KEY (user_id, symbol)
            );
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                direction TEXT NOT NULL CHECK (direction IN ('buy', 'sell')),
                symbol TEXT NOT NULL,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price REAL NOT NULL,
                executed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);",
        )
        .map_err(|e: rusqlite::Error| PapertradeError::DatabaseQuery {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, PapertradeError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| PapertradeError::Database {
                reason: e.to_string(),
            })
    }
}

fn query_err(e: rusqlite::Error) -> PapertradeError {
    PapertradeError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn row_to_user(row: &rusqlite::Row<'_>) -> Result<UserAccount, rusqlite::Error> {
    Ok(UserAccount {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        cash: row.get(3)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                raw.len(),
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

impl LedgerStorePort for SqliteLedgerStore {
    fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        starting_cash: f64,
    ) -> Result<UserAccount, PapertradeError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, password_hash, cash) VALUES (?1, ?2, ?3)",
            params![username, password_hash, starting_cash],
        )
        .map_err(|e: rusqlite::Error| {
            if is_unique_violation(&e) {
                PapertradeError::UsernameTaken {
                    username: username.to_string(),
                }
            } else {
                query_err(e)
            }
        })?;

        Ok(UserAccount {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            cash: starting_cash,
        })
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserAccount>, PapertradeError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, username, password_hash, cash FROM users WHERE username = ?1",
            params![username],
            row_to_user,
        )
        .optional()
        .map_err(query_err)
    }

    fn user_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, PapertradeError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, username, password_hash, cash FROM users WHERE id = ?1",
            params![user_id],
            row_to_user,
        )
        .optional()
        .map_err(query_err)
    }

    fn holdings(&self, user_id: i64) -> Result<Vec<HoldingRow>, PapertradeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT h.symbol,
                        (SELECT t.name FROM transactions t
                          WHERE t.user_id = h.user_id AND t.symbol = h.symbol
                          ORDER BY t.id DESC LIMIT 1),
                        h.quantity
                   FROM holdings h
                  WHERE h.user_id = ?1
                  ORDER BY h.symbol ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let symbol: String = row.get(0)?;
                let name: Option<String> = row.get(1)?;
                Ok(HoldingRow {
                    name: name.unwrap_or_else(|| symbol.clone()),
                    symbol,
                    quantity: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        let mut holdings = Vec::new();
        for row in rows {
            holdings.push(row.map_err(query_err)?);
        }
        Ok(holdings)
    }

    fn transactions(&self, user_id: i64) -> Result<Vec<TradeRecord>, PapertradeError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, direction, symbol, name, quantity, price, executed_at
                   FROM transactions
                  WHERE user_id = ?1
                  ORDER BY id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                let direction_str: String = row.get(2)?;
                let direction = TradeDirection::parse(&direction_str).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        direction_str.len(),
                        rusqlite::types::Type::Text,
                        format!("unknown trade direction {direction_str:?}").into(),
                    )
                })?;
                let executed_at_str: String = row.get(7)?;
                Ok(TradeRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    direction,
                    symbol: row.get(3)?,
                    name: row.get(4)?,
                    quantity: row.get(5)?,
                    price: row.get(6)?,
                    executed_at: parse_timestamp(&executed_at_str)?,
                })
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?);
        }
        Ok(records)
    }

    fn execute_trade(
        &self,
        user_id: i64,
        direction: TradeDirection,
        quote: &Quote,
        shares: i64,
        executed_at: DateTime<Utc>,
    ) -> Result<(), PapertradeError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;

        let cash: f64 = tx
            .query_row(
                "SELECT cash FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?
            .ok_or(PapertradeError::UnknownUser { user_id })?;

        let held: i64 = tx
            .query_row(
                "SELECT quantity FROM holdings WHERE user_id = ?1 AND symbol = ?2",
                params![user_id, quote.symbol],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)?
            .unwrap_or(0);

        let total = quote.price * shares as f64;
        match direction {
            TradeDirection::Buy => {
                if cash < total {
                    return Err(PapertradeError::InsufficientFunds {
                        required: total,
                        available: cash,
                    });
                }
            }
            TradeDirection::Sell => {
                if shares > held {
                    return Err(PapertradeError::InsufficientShares {
                        symbol: quote.symbol.clone(),
                        requested: shares,
                        held,
                    });
                }
            }
        }

        tx.execute(
            "INSERT INTO transactions (user_id, direction, symbol, name, quantity, price, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user_id,
                direction.as_str(),
                quote.symbol,
                quote.name,
                shares,
                quote.price,
                executed_at.format(TIMESTAMP_FORMAT).to_string()
            ],
        )
        .map_err(query_err)?;

        match direction {
            TradeDirection::Buy => {
                tx.execute(
                    "INSERT OR IGNORE INTO holdings (user_id, symbol, quantity) VALUES (?1, ?2, 0)",
                    params![user_id, quote.symbol],
                )
                .map_err(query_err)?;
                tx.execute(
                    "UPDATE holdings SET quantity = quantity + ?1 WHERE user_id = ?2 AND symbol = ?3",
                    params![shares, user_id, quote.symbol],
                )
                .map_err(query_err)?;
                tx.execute(
                    "UPDATE users SET cash = cash - ?1 WHERE id = ?2",
                    params![total, user_id],
                )
                .map_err(query_err)?;
            }
            TradeDirection::Sell => {
                tx.execute(
                    "UPDATE holdings SET quantity = quantity - ?1 WHERE user_id = ?2 AND symbol = ?3",
                    params![shares, user_id, quote.symbol],
                )
                .map_err(query_err)?;
                // quantity-zero holdings are removed, never retained
                tx.execute(
                    "DELETE FROM holdings WHERE user_id = ?1 AND symbol = ?2 AND quantity = 0",
                    params![user_id, quote.symbol],
                )
                .map_err(query_err)?;
                tx.execute(
                    "UPDATE users SET cash = cash + ?1 WHERE id = ?2",
                    params![total, user_id],
                )
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteLedgerStore {
        let store = SqliteLedgerStore::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store
    }

    fn quote(symbol: &str, name: &str, price: f64) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
        }
    }

    fn now() -> DateTime<Utc> {
        NaiveDateTime::parse_from_str("2024-06-01 12:00:00", TIMESTAMP_FORMAT)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let store = store();
        store.initialize_schema().unwrap();
    }

    #[test]
    fn create_user_assigns_id_and_cash() {
        let store = store();
        let user = store.create_user("alice", "hash", 10_000.0).unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.cash, 10_000.0);

        let fetched = store.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(fetched, user);
        assert_eq!(store.user_by_username("alice").unwrap().unwrap(), user);
    }

    #[test]
    fn duplicate_username_maps_to_username_taken() {
        let store = store();
        store.create_user("alice", "h1", 10_000.0).unwrap();

        let err = store.create_user("alice", "h2", 10_000.0).unwrap_err();
        assert!(matches!(err, PapertradeError::UsernameTaken { .. }));
    }

    #[test]
    fn missing_user_lookups_return_none() {
        let store = store();
        assert!(store.user_by_username("nobody").unwrap().is_none());
        assert!(store.user_by_id(99).unwrap().is_none());
    }

    #[test]
    fn buy_appends_transaction_creates_holding_and_debits_cash() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();

        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap();

        let after = store.user_by_id(user.id).unwrap().unwrap();
        assert_eq!(after.cash, 9_000.0);

        let holdings = store.holdings(user.id).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].symbol, "NFLX");
        assert_eq!(holdings[0].name, "Netflix");
        assert_eq!(holdings[0].quantity, 10);

        let txns = store.transactions(user.id).unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].direction, TradeDirection::Buy);
        assert_eq!(txns[0].quantity, 10);
        assert_eq!(txns[0].price, 100.0);
        assert_eq!(txns[0].executed_at, now());
    }

    #[test]
    fn repeat_buy_increments_existing_holding() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();
        let q = quote("NFLX", "Netflix", 100.0);

        store.execute_trade(user.id, TradeDirection::Buy, &q, 10, now()).unwrap();
        store.execute_trade(user.id, TradeDirection::Buy, &q, 5, now()).unwrap();

        let holdings = store.holdings(user.id).unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].quantity, 15);
        assert_eq!(store.user_by_id(user.id).unwrap().unwrap().cash, 8_500.0);
    }

    #[test]
    fn insufficient_funds_changes_nothing() {
        let store = store();
        let user = store.create_user("alice", "h", 500.0).unwrap();

        let err = store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap_err();
        assert!(matches!(err, PapertradeError::InsufficientFunds { .. }));

        assert_eq!(store.user_by_id(user.id).unwrap().unwrap().cash, 500.0);
        assert!(store.holdings(user.id).unwrap().is_empty());
        assert!(store.transactions(user.id).unwrap().is_empty());
    }

    #[test]
    fn partial_sell_decrements_holding_and_credits_cash() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();
        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap();

        store
            .execute_trade(user.id, TradeDirection::Sell, &quote("NFLX", "Netflix", 110.0), 4, now())
            .unwrap();

        let holdings = store.holdings(user.id).unwrap();
        assert_eq!(holdings[0].quantity, 6);
        assert_eq!(store.user_by_id(user.id).unwrap().unwrap().cash, 9_440.0);

        let txns = store.transactions(user.id).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[1].direction, TradeDirection::Sell);
    }

    #[test]
    fn sell_to_zero_removes_the_holding_row() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();
        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap();

        store
            .execute_trade(user.id, TradeDirection::Sell, &quote("NFLX", "Netflix", 110.0), 10, now())
            .unwrap();

        assert!(store.holdings(user.id).unwrap().is_empty());
        assert_eq!(store.user_by_id(user.id).unwrap().unwrap().cash, 10_100.0);
        assert_eq!(store.transactions(user.id).unwrap().len(), 2);
    }

    #[test]
    fn oversell_changes_nothing() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();
        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap();

        let err = store
            .execute_trade(user.id, TradeDirection::Sell, &quote("NFLX", "Netflix", 110.0), 11, now())
            .unwrap_err();
        assert!(matches!(
            err,
            PapertradeError::InsufficientShares { requested: 11, held: 10, .. }
        ));

        assert_eq!(store.holdings(user.id).unwrap()[0].quantity, 10);
        assert_eq!(store.user_by_id(user.id).unwrap().unwrap().cash, 9_000.0);
        assert_eq!(store.transactions(user.id).unwrap().len(), 1);
    }

    #[test]
    fn sell_of_unheld_symbol_is_rejected() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();

        let err = store
            .execute_trade(user.id, TradeDirection::Sell, &quote("NFLX", "Netflix", 110.0), 1, now())
            .unwrap_err();
        assert!(matches!(
            err,
            PapertradeError::InsufficientShares { held: 0, .. }
        ));
    }

    #[test]
    fn trade_for_unknown_user_is_rejected() {
        let store = store();
        let err = store
            .execute_trade(42, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 1, now())
            .unwrap_err();
        assert!(matches!(err, PapertradeError::UnknownUser { user_id: 42 }));
    }

    #[test]
    fn holding_names_come_from_the_latest_transaction() {
        let store = store();
        let user = store.create_user("alice", "h", 10_000.0).unwrap();

        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix Inc", 100.0), 5, now())
            .unwrap();
        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("NFLX", "Netflix, Inc.", 101.0), 5, now())
            .unwrap();

        let holdings = store.holdings(user.id).unwrap();
        assert_eq!(holdings[0].name, "Netflix, Inc.");
    }

    #[test]
    fn holdings_are_sorted_by_symbol() {
        let store = store();
        let user = store.create_user("alice", "h", 100_000.0).unwrap();

        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("MSFT", "Microsoft", 10.0), 1, now())
            .unwrap();
        store
            .execute_trade(user.id, TradeDirection::Buy, &quote("AAPL", "Apple", 10.0), 1, now())
            .unwrap();

        let holdings = store.holdings(user.id).unwrap();
        let symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn ledger_isolation_between_users() {
        let store = store();
        let alice = store.create_user("alice", "h", 10_000.0).unwrap();
        let bob = store.create_user("bob", "h", 10_000.0).unwrap();

        store
            .execute_trade(alice.id, TradeDirection::Buy, &quote("NFLX", "Netflix", 100.0), 10, now())
            .unwrap();

        assert!(store.holdings(bob.id).unwrap().is_empty());
        assert!(store.transactions(bob.id).unwrap().is_empty());
        assert_eq!(store.user_by_id(bob.id).unwrap().unwrap().cash, 10_000.0);
    }
}
