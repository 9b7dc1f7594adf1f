//! User account record.

/// A registered user as stored in the ledger store.
///
/// `cash` is the settled balance in dollars; it is only ever mutated inside
/// the store's trade transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub cash: f64,
}
