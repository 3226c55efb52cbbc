//! Market snapshot provider
//!
//! Produces the immutable `MarketSnapshot` every opinion source in a
//! cycle consumes. One snapshot per cycle; a fetch failure aborts the
//! cycle before any opinions are collected ("no data, no action").

use crate::config::with_config;
use crate::errors::SwarmBotError;
use crate::exchange::ExchangeApi;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable market state for one cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Mid price between best bid and ask
    pub price: f64,
    pub bid: f64,
    pub ask: f64,
    /// Best bid/ask spread as a fraction of mid
    pub spread: f64,
    /// Std deviation of recent one-minute log returns
    pub volatility: f64,
    /// Recent close prices, oldest first (feeds the SMA windows)
    pub closes: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Fetch a snapshot for one symbol
///
/// Request timeouts are enforced by the exchange client and are
/// required to be shorter than the cycle interval (config validation).
pub async fn fetch_snapshot(
    exchange: &dyn ExchangeApi,
    symbol: &str,
) -> Result<MarketSnapshot, SwarmBotError> {
    let window = with_config(|cfg| {
        cfg.exchange
            .volatility_window
            .max(cfg.swarm.sma_slow_window)
    });

    let ticker = exchange.book_ticker(symbol).await?;
    let closes = exchange.recent_closes(symbol, window).await?;

    let price = ticker.mid();
    if price <= 0.0 || !price.is_finite() {
        return Err(SwarmBotError::MalformedResponse {
            endpoint: "bookTicker".to_string(),
            message: format!("non-positive mid price for {}", symbol),
        });
    }

    Ok(MarketSnapshot {
        symbol: symbol.to_string(),
        price,
        bid: ticker.bid_price,
        ask: ticker.ask_price,
        spread: ticker.spread_fraction(),
        volatility: log_return_volatility(&closes),
        closes,
        timestamp: Utc::now(),
    })
}

/// Std deviation of log returns over a close series
pub fn log_return_volatility(closes: &[f64]) -> f64 {
    if closes.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volatility_of_flat_series_is_zero() {
        let closes = vec![100.0; 30];
        assert_eq!(log_return_volatility(&closes), 0.0);
    }

    #[test]
    fn volatility_grows_with_swing_size() {
        let calm: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let wild: Vec<f64> = (0..30)
            .map(|i| 100.0 + if i % 2 == 0 { 5.0 } else { -5.0 })
            .collect();
        assert!(log_return_volatility(&wild) > log_return_volatility(&calm));
    }

    #[test]
    fn too_short_series_yields_zero() {
        assert_eq!(log_return_volatility(&[]), 0.0);
        assert_eq!(log_return_volatility(&[100.0]), 0.0);
    }
}
