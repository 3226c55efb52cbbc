//! Technical opinion source: SMA crossover trend follower
//!
//! Compares a fast and a slow simple moving average over the snapshot
//! closes. A fast average more than `trend_threshold` above the slow
//! one votes Buy, more than the threshold below votes Sell, anything
//! in between is Hold. Confidence scales with how far past the
//! threshold the gap sits.

use super::types::{Opinion, TradeAction};
use super::{OpinionSource, SOURCE_TECHNICAL};
use crate::config::with_config;
use crate::market::MarketSnapshot;
use crate::portfolio::PortfolioState;
use async_trait::async_trait;

pub struct TechnicalSource {
    fast_window: usize,
    slow_window: usize,
    trend_threshold: f64,
}

impl TechnicalSource {
    pub fn from_config() -> Self {
        with_config(|cfg| Self {
            fast_window: cfg.swarm.sma_fast_window,
            slow_window: cfg.swarm.sma_slow_window,
            trend_threshold: cfg.swarm.trend_threshold,
        })
    }

    #[cfg(test)]
    pub fn with_windows(fast: usize, slow: usize, threshold: f64) -> Self {
        Self {
            fast_window: fast,
            slow_window: slow,
            trend_threshold: threshold,
        }
    }
}

/// Simple moving average over the trailing `window` values
pub fn sma(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

#[async_trait]
impl OpinionSource for TechnicalSource {
    fn name(&self) -> &'static str {
        SOURCE_TECHNICAL
    }

    async fn evaluate(&self, snapshot: &MarketSnapshot, _portfolio: &PortfolioState) -> Opinion {
        let (fast, slow) = match (
            sma(&snapshot.closes, self.fast_window),
            sma(&snapshot.closes, self.slow_window),
        ) {
            (Some(f), Some(s)) if s > 0.0 => (f, s),
            // Not enough history yet
            _ => return Opinion::abstain(SOURCE_TECHNICAL),
        };

        let gap = (fast - slow) / slow;

        if gap.abs() <= self.trend_threshold {
            return Opinion::new(SOURCE_TECHNICAL, TradeAction::Hold, 0.4);
        }

        // Confidence ramps from 0.5 at the threshold toward 1.0 as the
        // gap reaches three times the threshold
        let excess = (gap.abs() - self.trend_threshold) / (self.trend_threshold * 2.0);
        let confidence = 0.5 + 0.5 * excess.min(1.0);

        let action = if gap > 0.0 {
            TradeAction::Buy
        } else {
            TradeAction::Sell
        };
        Opinion::new(SOURCE_TECHNICAL, action, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot_with_closes(closes: Vec<f64>) -> MarketSnapshot {
        let price = *closes.last().unwrap_or(&100.0);
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price,
            bid: price,
            ask: price,
            spread: 0.0002,
            volatility: 0.001,
            closes,
            timestamp: Utc::now(),
        }
    }

    fn portfolio() -> PortfolioState {
        PortfolioState::new("BTCUSDT", 1000.0)
    }

    #[test]
    fn sma_requires_full_window() {
        assert_eq!(sma(&[1.0, 2.0], 3), None);
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
    }

    #[tokio::test]
    async fn rising_closes_vote_buy() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let source = TechnicalSource::with_windows(5, 20, 0.002);
        let opinion = source.evaluate(&snapshot_with_closes(closes), &portfolio()).await;
        assert_eq!(opinion.action, TradeAction::Buy);
        assert!(opinion.confidence >= 0.5);
    }

    #[tokio::test]
    async fn falling_closes_vote_sell() {
        let closes: Vec<f64> = (0..20).map(|i| 200.0 - 2.0 * i as f64).collect();
        let source = TechnicalSource::with_windows(5, 20, 0.002);
        let opinion = source.evaluate(&snapshot_with_closes(closes), &portfolio()).await;
        assert_eq!(opinion.action, TradeAction::Sell);
    }

    #[tokio::test]
    async fn flat_market_holds() {
        let source = TechnicalSource::with_windows(5, 20, 0.002);
        let opinion = source
            .evaluate(&snapshot_with_closes(vec![100.0; 20]), &portfolio())
            .await;
        assert_eq!(opinion.action, TradeAction::Hold);
        assert!(opinion.confidence > 0.0);
    }

    #[tokio::test]
    async fn short_history_abstains() {
        let source = TechnicalSource::with_windows(5, 20, 0.002);
        let opinion = source
            .evaluate(&snapshot_with_closes(vec![100.0; 5]), &portfolio())
            .await;
        assert_eq!(opinion.action, TradeAction::Hold);
        assert_eq!(opinion.confidence, 0.0);
    }
}
