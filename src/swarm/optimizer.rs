//! Optimizer opinion source
//!
//! Votes from the random-forest reward model trained in the learning
//! task. Features for the current snapshot are scored against the
//! shared model; a positive predicted reward votes Buy, a negative
//! one Sell. Until the first training round completes the source
//! abstains.

use super::types::{Opinion, TradeAction};
use super::{OpinionSource, SOURCE_OPTIMIZER};
use crate::learning::{market_features, SharedModel};
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::portfolio::PortfolioState;
use async_trait::async_trait;
use smartcore::linalg::basic::matrix::DenseMatrix;

/// Predicted reward is a per-cycle return fraction; this scale maps
/// a 0.25% predicted return to full confidence
const CONFIDENCE_SCALE: f64 = 400.0;

/// Predictions inside this band are treated as noise
const NEUTRAL_BAND: f64 = 1e-5;

pub struct OptimizerSource {
    model: SharedModel,
}

impl OptimizerSource {
    pub fn new(model: SharedModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl OpinionSource for OptimizerSource {
    fn name(&self) -> &'static str {
        SOURCE_OPTIMIZER
    }

    async fn evaluate(&self, snapshot: &MarketSnapshot, _portfolio: &PortfolioState) -> Opinion {
        let features = market_features(snapshot);

        let prediction = {
            let guard = self.model.lock();
            let model = match guard.as_ref() {
                Some(model) => model,
                // No training round has completed yet
                None => return Opinion::abstain(SOURCE_OPTIMIZER),
            };

            let matrix = match DenseMatrix::from_2d_vec(&vec![features]) {
                Ok(m) => m,
                Err(e) => {
                    logger::warning(
                        LogTag::Learner,
                        &format!("feature matrix build failed: {}", e),
                    );
                    return Opinion::abstain(SOURCE_OPTIMIZER);
                }
            };

            match model.predict(&matrix) {
                Ok(predictions) if !predictions.is_empty() => predictions[0],
                Ok(_) => return Opinion::abstain(SOURCE_OPTIMIZER),
                Err(e) => {
                    logger::warning(LogTag::Learner, &format!("model predict failed: {}", e));
                    return Opinion::abstain(SOURCE_OPTIMIZER);
                }
            }
        };

        if !prediction.is_finite() || prediction.abs() <= NEUTRAL_BAND {
            return Opinion::new(SOURCE_OPTIMIZER, TradeAction::Hold, 0.3);
        }

        let confidence = (prediction.abs() * CONFIDENCE_SCALE).clamp(0.0, 1.0);
        let action = if prediction > 0.0 {
            TradeAction::Buy
        } else {
            TradeAction::Sell
        };
        Opinion::new(SOURCE_OPTIMIZER, action, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learning::train_model;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".to_string(),
            price: 100.0,
            bid: 99.99,
            ask: 100.01,
            spread: 0.0002,
            volatility: 0.001,
            closes: (0..30).map(|i| 100.0 + 0.1 * i as f64).collect(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn untrained_model_abstains() {
        let source = OptimizerSource::new(Arc::new(Mutex::new(None)));
        let opinion = source
            .evaluate(&snapshot(), &PortfolioState::new("BTCUSDT", 1000.0))
            .await;
        assert_eq!(opinion.action, TradeAction::Hold);
        assert_eq!(opinion.confidence, 0.0);
    }

    #[tokio::test]
    async fn trained_model_votes() {
        // Constant positive rewards make the forest predict positive
        let features: Vec<Vec<f64>> = (0..60)
            .map(|i| {
                let x = i as f64 / 60.0;
                vec![x * 0.001, x * 0.002, x * 0.001, 0.001, 0.0002]
            })
            .collect();
        let rewards = vec![0.01; 60];
        let model = train_model(&features, &rewards).expect("training should succeed");

        let source = OptimizerSource::new(Arc::new(Mutex::new(Some(model))));
        let opinion = source
            .evaluate(&snapshot(), &PortfolioState::new("BTCUSDT", 1000.0))
            .await;

        assert_eq!(opinion.action, TradeAction::Buy);
        assert!(opinion.confidence > 0.0);
    }
}
