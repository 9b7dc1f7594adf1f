#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    Router,
};
use papertrade::adapters::sqlite_store::SqliteLedgerStore;
use papertrade::adapters::web::{build_router, AppState};
use papertrade::domain::quote::Quote;
use papertrade::ports::config_port::ConfigPort;
use papertrade::ports::ledger_port::LedgerStorePort;
use papertrade::ports::quote_port::QuotePort;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const TEST_STARTING_CASH: f64 = 10_000.0;

/// Quote port stub with mutable prices, so a test can move the market
/// between orders.
pub struct MockQuotePort {
    quotes: Mutex<HashMap<String, Quote>>,
}

impl MockQuotePort {
    pub fn new() -> Self {
        Self {
            quotes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_quote(self, symbol: &str, name: &str, price: f64) -> Self {
        self.quotes.lock().unwrap().insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                name: name.to_string(),
                price,
            },
        );
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        if let Some(q) = self.quotes.lock().unwrap().get_mut(symbol) {
            q.price = price;
        }
    }
}

#[async_trait]
impl QuotePort for MockQuotePort {
    async fn lookup(&self, symbol: &str) -> Option<Quote> {
        self.quotes.lock().unwrap().get(symbol).cloned()
    }
}

pub struct MockConfigPort;

impl ConfigPort for MockConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match (section, key) {
            // 64 zero bytes, hex-encoded
            ("auth", "session_secret") => Some("00".repeat(64)),
            _ => None,
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match (section, key) {
            ("auth", "session_lifetime") => 86_400,
            _ => default,
        }
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        match (section, key) {
            ("ledger", "starting_cash") => TEST_STARTING_CASH,
            _ => default,
        }
    }

    fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
        default
    }
}

/// App over a fresh in-memory ledger. The store is returned too so tests can
/// assert on persisted state directly.
pub fn build_test_app(quotes: Arc<MockQuotePort>) -> (Router, Arc<SqliteLedgerStore>) {
    let store = Arc::new(SqliteLedgerStore::in_memory().unwrap());
    store.initialize_schema().unwrap();

    let store_port: Arc<dyn LedgerStorePort + Send + Sync> = Arc::clone(&store);
    let state = AppState {
        store: store_port,
        quotes,
        config: Arc::new(MockConfigPort),
    };

    (build_router(state).unwrap(), store)
}

pub fn form_post(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

pub fn register_request(username: &str, password: &str, confirmation: &str) -> Request<Body> {
    form_post(
        "/register",
        format!("username={username}&password={password}&confirmation={confirmation}"),
    )
}

pub fn login_request(username: &str, password: &str) -> Request<Body> {
    form_post("/login", format!("username={username}&password={password}"))
}

pub fn extract_cookies(response: &axum::http::Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

pub fn build_cookie_header(set_cookies: &[String]) -> String {
    set_cookies
        .iter()
        .map(|sc| sc.split(';').next().unwrap_or("").to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Register and log in a user, returning the session cookie header.
pub async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
    let register_resp = app
        .clone()
        .oneshot(register_request(username, password, password))
        .await
        .unwrap();
    assert!(
        register_resp.status().is_redirection(),
        "registration should redirect, got {}",
        register_resp.status()
    );

    let login_resp = app
        .clone()
        .oneshot(login_request(username, password))
        .await
        .unwrap();
    assert!(
        login_resp.status().is_redirection(),
        "login should redirect, got {}",
        login_resp.status()
    );

    let cookies = extract_cookies(&login_resp);
    assert!(!cookies.is_empty(), "login should set a session cookie");
    build_cookie_header(&cookies)
}

pub fn get_with_cookies(uri: &str, cookie_header: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie_header)
        .body(Body::empty())
        .unwrap()
}

pub fn post_with_cookies(uri: &str, cookie_header: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::COOKIE, cookie_header)
        .body(Body::from(body))
        .unwrap()
}
