//! HTML page templates using Askama.

use askama::Template;

use crate::domain::ledger::PortfolioView;
use crate::domain::money::usd;
use crate::domain::quote::Quote;
use crate::domain::trade::TradeRecord;

#[derive(Template)]
#[template(path = "portfolio.html")]
pub struct PortfolioTemplate {
    pub username: String,
    pub rows: Vec<PortfolioRowView>,
    pub cash: String,
    pub grand_total: String,
}

pub struct PortfolioRowView {
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub price: String,
    pub value: String,
}

impl PortfolioTemplate {
    pub fn from_view(username: &str, view: PortfolioView) -> Self {
        let rows = view
            .positions
            .into_iter()
            .map(|p| PortfolioRowView {
                symbol: p.symbol,
                name: p.name,
                quantity: p.quantity,
                price: usd(p.price),
                value: usd(p.value),
            })
            .collect();
        Self {
            username: username.to_string(),
            rows,
            cash: usd(view.cash),
            grand_total: usd(view.grand_total),
        }
    }
}

#[derive(Template)]
#[template(path = "buy.html")]
pub struct BuyTemplate;

#[derive(Template)]
#[template(path = "sell.html")]
pub struct SellTemplate {
    pub symbols: Vec<String>,
}

#[derive(Template)]
#[template(path = "quote.html")]
pub struct QuoteFormTemplate;

#[derive(Template)]
#[template(path = "quoted.html")]
pub struct QuotedTemplate {
    pub symbol: String,
    pub name: String,
    pub price: String,
}

impl QuotedTemplate {
    pub fn from_quote(quote: Quote) -> Self {
        Self {
            symbol: quote.symbol,
            name: quote.name,
            price: usd(quote.price),
        }
    }
}

#[derive(Template)]
#[template(path = "history.html")]
pub struct HistoryTemplate {
    pub rows: Vec<HistoryRowView>,
}

pub struct HistoryRowView {
    pub direction: &'static str,
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub price: String,
    pub executed_at: String,
}

impl HistoryTemplate {
    pub fn from_records(records: Vec<TradeRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|r| HistoryRowView {
                direction: r.direction.as_str(),
                symbol: r.symbol,
                name: r.name,
                quantity: r.quantity,
                price: usd(r.price),
                executed_at: r.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            })
            .collect();
        Self { rows }
    }
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate;

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate;

#[derive(Template)]
#[template(path = "apology.html")]
pub struct ApologyTemplate {
    pub status: u16,
    pub message: String,
}
