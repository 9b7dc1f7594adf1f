//! HTTP quote service adapter.
//!
//! Talks to an IEX-style quote endpoint:
//! `GET {base_url}/stock/{SYMBOL}/quote?token={api_key}` returning
//! `{"symbol": ..., "companyName": ..., "latestPrice": ...}`.

use async_trait::async_trait;
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::quote::Quote;
use crate::ports::config_port::ConfigPort;
use crate::ports::quote_port::QuotePort;

const DEFAULT_BASE_URL: &str = "https://cloud.iexapis.com/stable";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

pub struct HttpQuoteAdapter {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct QuoteResponse {
    symbol: String,
    #[serde(rename = "companyName")]
    company_name: String,
    #[serde(rename = "latestPrice")]
    latest_price: Option<f64>,
}

impl HttpQuoteAdapter {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Build from `[quote]` config plus the API key taken from the
    /// environment by the caller.
    pub fn from_config(config: &dyn ConfigPort, api_key: String) -> Self {
        let base_url = config
            .get_string("quote", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout_secs =
            config.get_int("quote", "timeout_secs", DEFAULT_TIMEOUT_SECS as i64) as u64;
        Self::new(base_url, api_key, Duration::from_secs(timeout_secs))
    }
}

#[async_trait]
impl QuotePort for HttpQuoteAdapter {
    async fn lookup(&self, symbol: &str) -> Option<Quote> {
        let url = format!("{}/stock/{}/quote", self.base_url, symbol);

        let response = match self
            .client
            .get(&url)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("quote lookup for {symbol} failed: {e}");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("quote lookup for {symbol} returned HTTP {}", response.status());
            return None;
        }

        let body: QuoteResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("quote response for {symbol} was malformed: {e}");
                return None;
            }
        };

        let price = body.latest_price?;
        Some(Quote {
            symbol: body.symbol.to_uppercase(),
            name: body.company_name,
            price,
        })
    }
}
