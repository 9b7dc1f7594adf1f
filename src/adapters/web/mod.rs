//! Web server adapter.
//!
//! Axum router with askama-rendered pages. Sessions are signed cookies over
//! an in-memory store; ledger routes sit behind `login_required`, so an
//! anonymous request redirects to `/login` instead of erroring.

mod auth;
mod error;
mod handlers;
mod templates;

pub use auth::{AuthSession, Backend, Credentials, SessionUser};
pub use error::WebError;

use axum::{routing::get, Router};
use axum_login::{login_required, AuthManagerLayerBuilder};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_sessions::{cookie::Key, Expiry, MemoryStore, SessionManagerLayer};

use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::LedgerStorePort;
use crate::ports::quote_port::QuotePort;

pub struct AppState {
    pub store: Arc<dyn LedgerStorePort + Send + Sync>,
    pub quotes: Arc<dyn QuotePort>,
    pub config: Arc<dyn ConfigPort + Send + Sync>,
}

fn session_key(config: &dyn ConfigPort) -> Result<Key, PapertradeError> {
    let secret_hex =
        config
            .get_string("auth", "session_secret")
            .ok_or_else(|| PapertradeError::ConfigMissing {
                section: "auth".into(),
                key: "session_secret".into(),
            })?;
    let secret = hex::decode(secret_hex.trim()).map_err(|e| PapertradeError::ConfigInvalid {
        section: "auth".into(),
        key: "session_secret".into(),
        reason: e.to_string(),
    })?;
    Key::try_from(&secret[..]).map_err(|_| PapertradeError::ConfigInvalid {
        section: "auth".into(),
        key: "session_secret".into(),
        reason: format!("need at least 64 bytes of key material, got {}", secret.len()),
    })
}

pub fn build_router(state: AppState) -> Result<Router, PapertradeError> {
    let key = session_key(state.config.as_ref())?;
    let lifetime = state.config.get_int("auth", "session_lifetime", 86_400);

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.get_bool("web", "secure_cookies", false))
        .with_expiry(Expiry::OnInactivity(time::Duration::seconds(lifetime)))
        .with_signed(key);

    let backend = Backend::new(Arc::clone(&state.store));
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    Ok(Router::new()
        .route("/", get(handlers::portfolio))
        .route("/buy", get(handlers::buy_form).post(handlers::buy))
        .route("/sell", get(handlers::sell_form).post(handlers::sell))
        .route("/quote", get(handlers::quote_form).post(handlers::quote))
        .route("/history", get(handlers::history))
        .route_layer(login_required!(Backend, login_url = "/login"))
        .route("/login", get(handlers::login_form).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route(
            "/register",
            get(handlers::register_form).post(handlers::register),
        )
        .nest_service("/static", ServeDir::new("static"))
        .fallback(handlers::not_found)
        .layer(auth_layer)
        .with_state(Arc::new(state)))
}
