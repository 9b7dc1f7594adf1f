//! HTTP request handlers.
//!
//! Every handler resolves the session user, delegates to the ledger
//! operations, and maps domain failures onto apology pages through
//! [`WebError`]. Successful mutations redirect rather than render.

use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use std::sync::Arc;

use crate::domain::ledger;

use super::auth::{AuthSession, Credentials};
use super::templates;
use super::{AppState, WebError};

#[derive(Debug, serde::Deserialize)]
pub struct TradeForm {
    pub symbol: Option<String>,
    pub shares: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct QuoteForm {
    pub symbol: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub confirmation: Option<String>,
}

pub async fn portfolio(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let view = ledger::portfolio(state.store.as_ref(), state.quotes.as_ref(), user.id).await?;
    Ok(templates::PortfolioTemplate::from_view(&user.username, view).into_response())
}

pub async fn buy_form() -> Response {
    templates::BuyTemplate.into_response()
}

pub async fn buy(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<TradeForm>,
) -> Result<Response, WebError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };

    ledger::buy(
        state.store.as_ref(),
        state.quotes.as_ref(),
        user.id,
        &form.symbol.unwrap_or_default(),
        &form.shares.unwrap_or_default(),
    )
    .await?;

    Ok(Redirect::to("/").into_response())
}

pub async fn sell_form(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let symbols = state
        .store
        .holdings(user.id)?
        .into_iter()
        .map(|h| h.symbol)
        .collect();
    Ok(templates::SellTemplate { symbols }.into_response())
}

pub async fn sell(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
    Form(form): Form<TradeForm>,
) -> Result<Response, WebError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };

    ledger::sell(
        state.store.as_ref(),
        state.quotes.as_ref(),
        user.id,
        &form.symbol.unwrap_or_default(),
        &form.shares.unwrap_or_default(),
    )
    .await?;

    Ok(Redirect::to("/").into_response())
}

pub async fn quote_form() -> Response {
    templates::QuoteFormTemplate.into_response()
}

pub async fn quote(
    State(state): State<Arc<AppState>>,
    Form(form): Form<QuoteForm>,
) -> Result<Response, WebError> {
    let quote =
        ledger::resolve_quote(state.quotes.as_ref(), &form.symbol.unwrap_or_default()).await?;
    Ok(templates::QuotedTemplate::from_quote(quote).into_response())
}

pub async fn history(
    auth_session: AuthSession,
    State(state): State<Arc<AppState>>,
) -> Result<Response, WebError> {
    let Some(user) = auth_session.user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let records = ledger::history(state.store.as_ref(), user.id)?;
    Ok(templates::HistoryTemplate::from_records(records).into_response())
}

pub async fn login_form() -> Response {
    templates::LoginTemplate.into_response()
}

pub async fn login(
    mut auth_session: AuthSession,
    Form(form): Form<LoginForm>,
) -> Result<Response, WebError> {
    let creds = Credentials {
        username: form.username.unwrap_or_default(),
        password: form.password.unwrap_or_default(),
    };

    let user = match auth_session.authenticate(creds).await {
        Ok(Some(user)) => user,
        Ok(None) => return Err(WebError::forbidden("invalid username and/or password")),
        Err(e) => {
            log::error!("authentication backend failed: {e}");
            return Err(WebError::internal("something went wrong"));
        }
    };

    auth_session.login(&user).await.map_err(|e| {
        log::error!("session login failed: {e}");
        WebError::internal("something went wrong")
    })?;

    log::info!("user {} logged in", user.username);
    Ok(Redirect::to("/").into_response())
}

pub async fn logout(mut auth_session: AuthSession) -> Result<Response, WebError> {
    auth_session.logout().await.map_err(|e| {
        log::error!("session logout failed: {e}");
        WebError::internal("something went wrong")
    })?;
    Ok(Redirect::to("/login").into_response())
}

pub async fn register_form() -> Response {
    templates::RegisterTemplate.into_response()
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, WebError> {
    let starting_cash = state.config.get_double("ledger", "starting_cash", 10_000.0);

    let user = ledger::register(
        state.store.as_ref(),
        starting_cash,
        &form.username.unwrap_or_default(),
        &form.password.unwrap_or_default(),
        &form.confirmation.unwrap_or_default(),
    )?;

    log::info!("registered user {}", user.username);
    Ok(Redirect::to("/login").into_response())
}

pub async fn not_found() -> WebError {
    WebError::not_found("page not found")
}
