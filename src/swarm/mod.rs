//! Opinion swarm
//!
//! Each cycle the swarm hands the same immutable market snapshot and
//! portfolio view to every registered source and collects one opinion
//! per source. Sources are infallible by contract: anything that can
//! go wrong inside a source degrades to an abstention (Hold at zero
//! confidence) so one sick source can never stall the cycle.

pub mod optimizer;
pub mod sentiment;
pub mod technical;
pub mod timing;
pub mod types;

pub use types::{Opinion, TradeAction};

use crate::config::with_config;
use crate::learning::SharedModel;
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::portfolio::PortfolioState;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

pub const SOURCE_TECHNICAL: &str = "technical";
pub const SOURCE_SENTIMENT: &str = "sentiment";
pub const SOURCE_OPTIMIZER: &str = "optimizer";
pub const SOURCE_TIMING: &str = "timing";

/// One voting member of the swarm
///
/// `evaluate` must not fail and must not mutate anything another
/// source can observe; internal state (baselines, models) is fine.
#[async_trait]
pub trait OpinionSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn evaluate(&self, snapshot: &MarketSnapshot, portfolio: &PortfolioState) -> Opinion;
}

/// Learner-adjustable source weights, shared between the swarm and
/// the learning task
#[derive(Clone)]
pub struct SourceWeights {
    inner: Arc<RwLock<HashMap<String, f64>>>,
}

impl SourceWeights {
    pub fn from_config() -> Self {
        let map = with_config(|cfg| {
            let mut map = HashMap::new();
            map.insert(SOURCE_TECHNICAL.to_string(), cfg.swarm.technical_weight);
            map.insert(SOURCE_SENTIMENT.to_string(), cfg.swarm.sentiment_weight);
            map.insert(SOURCE_OPTIMIZER.to_string(), cfg.swarm.optimizer_weight);
            map.insert(SOURCE_TIMING.to_string(), cfg.swarm.timing_weight);
            map
        });
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    pub fn get(&self, source: &str) -> f64 {
        self.inner.read().get(source).copied().unwrap_or(0.0)
    }

    /// Nudge one source's weight, clamped to stay non-negative
    pub fn adjust(&self, source: &str, delta: f64) {
        let mut map = self.inner.write();
        if let Some(weight) = map.get_mut(source) {
            *weight = (*weight + delta).max(0.0);
        }
    }

    pub fn all(&self) -> HashMap<String, f64> {
        self.inner.read().clone()
    }
}

/// The full swarm for one engine session
pub struct Swarm {
    sources: Vec<Box<dyn OpinionSource>>,
    weights: SourceWeights,
}

impl Swarm {
    /// Build the standard four-source swarm; weights are shared with
    /// the learner, which nudges them between training rounds
    pub fn from_config(model: SharedModel, weights: SourceWeights) -> Self {
        Self {
            sources: vec![
                Box::new(technical::TechnicalSource::from_config()),
                Box::new(sentiment::SentimentSource::from_config()),
                Box::new(optimizer::OptimizerSource::new(model)),
                Box::new(timing::TimingSource::from_config()),
            ],
            weights,
        }
    }

    #[cfg(test)]
    pub fn with_sources(sources: Vec<Box<dyn OpinionSource>>, weights: SourceWeights) -> Self {
        Self { sources, weights }
    }

    pub fn weights(&self) -> SourceWeights {
        self.weights.clone()
    }

    /// Collect one opinion per source for this cycle
    ///
    /// Sources are evaluated concurrently; they cannot observe each
    /// other and the output order matches registration order.
    pub async fn collect(
        &self,
        snapshot: &MarketSnapshot,
        portfolio: &PortfolioState,
    ) -> Vec<Opinion> {
        let futures = self
            .sources
            .iter()
            .map(|source| source.evaluate(snapshot, portfolio));
        let mut opinions = futures::future::join_all(futures).await;

        for opinion in &mut opinions {
            opinion.weight = self.weights.get(&opinion.source);
            logger::debug(
                LogTag::Swarm,
                &format!(
                    "{} {}: {} conf={:.2} w={:.2}",
                    snapshot.symbol,
                    opinion.source,
                    opinion.action.as_str(),
                    opinion.confidence,
                    opinion.weight
                ),
            );
        }

        opinions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct FixedSource {
        name: &'static str,
        action: TradeAction,
        confidence: f64,
    }

    #[async_trait]
    impl OpinionSource for FixedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn evaluate(&self, _: &MarketSnapshot, _: &PortfolioState) -> Opinion {
            Opinion::new(self.name, self.action, self.confidence)
        }
    }

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price: 100.0,
            bid: 99.99,
            ask: 100.01,
            spread: 0.0002,
            volatility: 0.001,
            closes: vec![100.0; 20],
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn collect_attaches_current_weights() {
        let weights = SourceWeights::from_config();
        let swarm = Swarm::with_sources(
            vec![Box::new(FixedSource {
                name: SOURCE_TECHNICAL,
                action: TradeAction::Buy,
                confidence: 0.8,
            })],
            weights.clone(),
        );

        weights.adjust(SOURCE_TECHNICAL, 0.1);
        let expected = weights.get(SOURCE_TECHNICAL);

        let opinions = swarm.collect(&snapshot(), &PortfolioState::new("BTCUSDT", 1000.0)).await;
        assert_eq!(opinions.len(), 1);
        assert!((opinions[0].weight - expected).abs() < 1e-12);
    }

    #[test]
    fn weights_never_go_negative() {
        let weights = SourceWeights::from_config();
        weights.adjust(SOURCE_SENTIMENT, -10.0);
        assert_eq!(weights.get(SOURCE_SENTIMENT), 0.0);
    }

    #[test]
    fn unknown_source_weight_is_zero() {
        let weights = SourceWeights::from_config();
        assert_eq!(weights.get("astrology"), 0.0);
    }
}
