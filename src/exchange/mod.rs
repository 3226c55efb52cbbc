//! Exchange connectivity
//!
//! The trading core talks to the exchange through the `ExchangeApi`
//! trait so the order lifecycle can be tested against a mock and the
//! bot can run without credentials:
//!
//! - `rest`: signed Binance-style REST client (live trading)
//! - `paper`: in-process simulated book (no credentials / --paper)
//! - `sign`: HMAC-SHA256 request signing
//!
//! Every method returns a component-level `SwarmBotError`; a non-2xx
//! response or malformed JSON is never a crash.

mod paper;
mod rest;
mod sign;
mod types;

pub use paper::PaperExchange;
pub use rest::RestExchange;
pub use sign::sign_query;
pub use types::*;

use crate::arguments;
use crate::config::with_config;
use crate::errors::SwarmBotError;
use async_trait::async_trait;
use std::sync::Arc;

/// Exchange operations the trading cycle depends on
///
/// Implementations must be safe to call concurrently from multiple
/// symbol engines.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Best bid/ask for a symbol
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, SwarmBotError>;

    /// Most recent kline close prices, oldest first
    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, SwarmBotError>;

    /// Account balances
    async fn account(&self) -> Result<AccountSnapshot, SwarmBotError>;

    /// Open orders for a symbol
    async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SwarmBotError>;

    /// Place a single limit order
    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, SwarmBotError>;

    /// Cancel one order by id
    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), SwarmBotError>;

    /// Cancel every open order for a symbol, returning how many were cancelled
    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize, SwarmBotError>;
}

/// Build the exchange client the current config calls for
///
/// Paper mode engages when credentials are missing or --paper is set.
pub fn build_exchange() -> Arc<dyn ExchangeApi> {
    let (api_key, api_secret) = with_config(|cfg| {
        (cfg.exchange.api_key.clone(), cfg.exchange.api_secret.clone())
    });

    let paper = api_key.is_empty() || api_secret.is_empty() || arguments::is_paper_mode_forced();

    if paper {
        Arc::new(PaperExchange::from_config())
    } else {
        Arc::new(RestExchange::from_config())
    }
}

/// Split a symbol like BTCUSDT into (base, quote) assets
///
/// Falls back to a 3-character quote when no known suffix matches.
pub fn split_symbol(symbol: &str) -> (String, String) {
    const KNOWN_QUOTES: [&str; 5] = ["USDT", "USDC", "FDUSD", "BTC", "ETH"];

    for quote in KNOWN_QUOTES {
        if symbol.len() > quote.len() && symbol.ends_with(quote) {
            let base = &symbol[..symbol.len() - quote.len()];
            return (base.to_string(), quote.to_string());
        }
    }

    let split = symbol.len().saturating_sub(3);
    (symbol[..split].to_string(), symbol[split..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_known_quote_suffixes() {
        assert_eq!(
            split_symbol("BTCUSDT"),
            ("BTC".to_string(), "USDT".to_string())
        );
        assert_eq!(
            split_symbol("ETHBTC"),
            ("ETH".to_string(), "BTC".to_string())
        );
        assert_eq!(
            split_symbol("SOLUSDC"),
            ("SOL".to_string(), "USDC".to_string())
        );
    }
}
