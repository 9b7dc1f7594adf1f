//! Authentication backend for axum-login, backed by the users table.

use axum_login::{AuthUser, AuthnBackend, UserId};
use std::sync::Arc;

use crate::domain::error::PapertradeError;
use crate::domain::ledger;
use crate::ports::ledger_port::LedgerStorePort;

/// The authenticated user bound to a session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    /// The stored password hash as bytes; axum-login uses it to validate the
    /// session, so changing the password invalidates live sessions.
    pw_hash_bytes: Vec<u8>,
}

impl SessionUser {
    fn from_account(account: crate::domain::account::UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username,
            pw_hash_bytes: account.password_hash.into_bytes(),
        }
    }
}

impl AuthUser for SessionUser {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn session_auth_hash(&self) -> &[u8] {
        &self.pw_hash_bytes
    }
}

/// Login credentials submitted via the login form.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn LedgerStorePort + Send + Sync>,
}

impl Backend {
    pub fn new(store: Arc<dyn LedgerStorePort + Send + Sync>) -> Self {
        Self { store }
    }
}

impl AuthnBackend for Backend {
    type User = SessionUser;
    type Credentials = Credentials;
    type Error = PapertradeError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        match ledger::authenticate(self.store.as_ref(), &creds.username, &creds.password) {
            Ok(account) => Ok(Some(SessionUser::from_account(account))),
            Err(PapertradeError::InvalidCredentials) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok(self
            .store
            .user_by_id(*user_id)?
            .map(SessionUser::from_account))
    }
}

pub type AuthSession = axum_login::AuthSession<Backend>;
