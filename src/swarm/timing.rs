//! Timing opinion source: spread and volatility regime gate
//!
//! Keeps an EWMA baseline of observed volatility across cycles. A
//! spike above `volatility_circuit_multiple` times the baseline votes
//! EmergencyStop; a merely elevated regime (wide spread or raised
//! volatility) votes Hold; a calm regime endorses the prevailing
//! micro-trend with confidence that grows as conditions get calmer.

use super::technical::sma;
use super::types::{Opinion, TradeAction};
use super::{OpinionSource, SOURCE_TIMING};
use crate::config::with_config;
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::portfolio::PortfolioState;
use async_trait::async_trait;
use parking_lot::Mutex;

/// EWMA smoothing for the volatility baseline
const BASELINE_ALPHA: f64 = 0.2;

/// Spread wider than this multiple of the quoting spread is "wide"
const WIDE_SPREAD_MULT: f64 = 2.0;

/// Volatility above this multiple of baseline is "elevated"
const ELEVATED_VOL_MULT: f64 = 2.0;

pub struct TimingSource {
    base_spread: f64,
    fast_window: usize,
    circuit_multiple: f64,
    /// Volatility baseline carried across cycles; None until first cycle
    baseline: Mutex<Option<f64>>,
}

impl TimingSource {
    pub fn from_config() -> Self {
        with_config(|cfg| Self {
            base_spread: cfg.engine.base_spread_pct / 100.0,
            fast_window: cfg.swarm.sma_fast_window,
            circuit_multiple: cfg.swarm.volatility_circuit_multiple,
            baseline: Mutex::new(None),
        })
    }

    #[cfg(test)]
    fn for_test(base_spread: f64, circuit_multiple: f64, baseline: Option<f64>) -> Self {
        Self {
            base_spread,
            fast_window: 5,
            circuit_multiple,
            baseline: Mutex::new(baseline),
        }
    }

    /// Fold the cycle's volatility into the baseline, returning the
    /// baseline as it stood before this observation
    fn observe(&self, volatility: f64) -> Option<f64> {
        let mut guard = self.baseline.lock();
        let previous = *guard;
        *guard = Some(match previous {
            Some(b) => b + BASELINE_ALPHA * (volatility - b),
            None => volatility,
        });
        previous
    }
}

#[async_trait]
impl OpinionSource for TimingSource {
    fn name(&self) -> &'static str {
        SOURCE_TIMING
    }

    async fn evaluate(&self, snapshot: &MarketSnapshot, _portfolio: &PortfolioState) -> Opinion {
        let baseline = self.observe(snapshot.volatility);

        // Circuit breaker: needs an established baseline to compare against
        if let Some(baseline) = baseline {
            if baseline > 0.0 && snapshot.volatility > self.circuit_multiple * baseline {
                logger::warning(
                    LogTag::Swarm,
                    &format!(
                        "{}: volatility {:.6} tripped circuit ({}x baseline {:.6})",
                        snapshot.symbol, snapshot.volatility, self.circuit_multiple, baseline
                    ),
                );
                return Opinion::new(SOURCE_TIMING, TradeAction::EmergencyStop, 1.0);
            }
        }

        let wide_spread = snapshot.spread > self.base_spread * WIDE_SPREAD_MULT;
        let elevated_vol = match baseline {
            Some(b) if b > 0.0 => snapshot.volatility > b * ELEVATED_VOL_MULT,
            _ => false,
        };

        if wide_spread || elevated_vol {
            return Opinion::new(SOURCE_TIMING, TradeAction::Hold, 0.6);
        }

        // Calm regime: lean into the micro-trend, calmer means more
        // confident quoting conditions
        let calmness = match baseline {
            Some(b) if b > 0.0 => (1.0 - snapshot.volatility / (b * ELEVATED_VOL_MULT)).max(0.0),
            _ => 0.0,
        };
        let confidence = 0.4 + 0.4 * calmness;

        let action = match sma(&snapshot.closes, self.fast_window) {
            Some(fast) if snapshot.price > fast => TradeAction::Buy,
            Some(fast) if snapshot.price < fast => TradeAction::Sell,
            _ => TradeAction::Hold,
        };

        Opinion::new(SOURCE_TIMING, action, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(spread: f64, volatility: f64, closes: Vec<f64>) -> MarketSnapshot {
        let price = *closes.last().unwrap_or(&100.0);
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price,
            bid: price,
            ask: price,
            spread,
            volatility,
            closes,
            timestamp: Utc::now(),
        }
    }

    fn portfolio() -> PortfolioState {
        PortfolioState::new("BTCUSDT", 1000.0)
    }

    #[tokio::test]
    async fn volatility_spike_trips_circuit() {
        let source = TimingSource::for_test(0.0015, 5.0, Some(0.001));
        let opinion = source
            .evaluate(&snapshot(0.0002, 0.01, vec![100.0; 10]), &portfolio())
            .await;
        assert_eq!(opinion.action, TradeAction::EmergencyStop);
        assert_eq!(opinion.confidence, 1.0);
    }

    #[tokio::test]
    async fn first_cycle_never_trips_circuit() {
        let source = TimingSource::for_test(0.0015, 5.0, None);
        let opinion = source
            .evaluate(&snapshot(0.0002, 0.5, vec![100.0; 10]), &portfolio())
            .await;
        assert_ne!(opinion.action, TradeAction::EmergencyStop);
    }

    #[tokio::test]
    async fn wide_spread_votes_hold() {
        let source = TimingSource::for_test(0.0015, 5.0, Some(0.001));
        let opinion = source
            .evaluate(&snapshot(0.01, 0.001, vec![100.0; 10]), &portfolio())
            .await;
        assert_eq!(opinion.action, TradeAction::Hold);
    }

    #[tokio::test]
    async fn calm_market_leans_into_micro_trend() {
        let source = TimingSource::for_test(0.0015, 5.0, Some(0.001));
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + 0.1 * i as f64).collect();
        let opinion = source
            .evaluate(&snapshot(0.0002, 0.0005, closes), &portfolio())
            .await;
        assert_eq!(opinion.action, TradeAction::Buy);
        assert!(opinion.confidence > 0.4);
    }
}
