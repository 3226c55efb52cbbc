//! Weighted consensus over swarm opinions
//!
//! Each action's score is the sum of weight x confidence over the
//! opinions voting for it; strength is the winning score normalized
//! by the total weight of all opinions. Rules, in order:
//!
//! - any EmergencyStop vote overrides everything at strength 1.0
//! - all sources abstaining (zero total score) yields Hold, not reached
//! - equal top scores break toward Hold (never toward a directional
//!   action on a tie)

use crate::swarm::{Opinion, TradeAction};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct Consensus {
    pub action: TradeAction,
    /// Winning score / total weight, in [0, 1]
    pub strength: f64,
    /// Whether strength met the configured threshold
    pub reached: bool,
    /// Per-action weight x confidence totals
    pub scores: HashMap<TradeAction, f64>,
    pub total_weight: f64,
}

/// Aggregate one cycle's opinions into a consensus
pub fn aggregate(opinions: &[Opinion], threshold: f64) -> Consensus {
    let mut scores: HashMap<TradeAction, f64> = HashMap::new();
    let mut total_weight = 0.0;

    for opinion in opinions {
        *scores.entry(opinion.action).or_insert(0.0) += opinion.weight * opinion.confidence;
        total_weight += opinion.weight;
    }

    // A single emergency vote is enough; halting must not depend on
    // the weight assigned to the source that saw the danger
    if opinions
        .iter()
        .any(|o| o.action == TradeAction::EmergencyStop)
    {
        return Consensus {
            action: TradeAction::EmergencyStop,
            strength: 1.0,
            reached: true,
            scores,
            total_weight,
        };
    }

    let total_score: f64 = scores.values().sum();
    if total_score <= 0.0 || total_weight <= 0.0 {
        return Consensus {
            action: TradeAction::Hold,
            strength: 0.0,
            reached: false,
            scores,
            total_weight,
        };
    }

    let best_score = scores.values().cloned().fold(0.0, f64::max);
    let tied: Vec<TradeAction> = scores
        .iter()
        .filter(|(_, s)| (**s - best_score).abs() < 1e-12)
        .map(|(a, _)| *a)
        .collect();

    let action = if tied.len() == 1 {
        tied[0]
    } else {
        TradeAction::Hold
    };

    let strength = (best_score / total_weight).clamp(0.0, 1.0);

    Consensus {
        action,
        strength,
        reached: strength >= threshold,
        scores,
        total_weight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opinion(action: TradeAction, confidence: f64, weight: f64) -> Opinion {
        let mut op = Opinion::new("test", action, confidence);
        op.weight = weight;
        op
    }

    #[test]
    fn unanimous_buy_strength() {
        let opinions = vec![
            opinion(TradeAction::Buy, 0.78, 0.25),
            opinion(TradeAction::Buy, 0.82, 0.30),
            opinion(TradeAction::Buy, 0.71, 0.20),
            opinion(TradeAction::Buy, 0.85, 0.25),
        ];
        let consensus = aggregate(&opinions, 0.65);
        assert_eq!(consensus.action, TradeAction::Buy);
        assert!((consensus.strength - 0.7955).abs() < 1e-9);
        assert!(consensus.reached);
    }

    #[test]
    fn scores_partition_the_weighted_mass() {
        let opinions = vec![
            opinion(TradeAction::Buy, 0.9, 0.30),
            opinion(TradeAction::Sell, 0.6, 0.20),
            opinion(TradeAction::Hold, 0.5, 0.25),
            opinion(TradeAction::Buy, 0.4, 0.25),
        ];
        let consensus = aggregate(&opinions, 0.65);

        let expected_total: f64 = opinions.iter().map(|o| o.weight * o.confidence).sum();
        let score_sum: f64 = consensus.scores.values().sum();
        assert!((score_sum - expected_total).abs() < 1e-12);
    }

    #[test]
    fn emergency_vote_overrides_everything() {
        let opinions = vec![
            opinion(TradeAction::Buy, 0.95, 0.75),
            opinion(TradeAction::EmergencyStop, 1.0, 0.25),
        ];
        let consensus = aggregate(&opinions, 0.65);
        assert_eq!(consensus.action, TradeAction::EmergencyStop);
        assert_eq!(consensus.strength, 1.0);
        assert!(consensus.reached);
    }

    #[test]
    fn all_abstaining_yields_unreached_hold() {
        let opinions = vec![
            opinion(TradeAction::Hold, 0.0, 0.30),
            opinion(TradeAction::Hold, 0.0, 0.70),
        ];
        let consensus = aggregate(&opinions, 0.65);
        assert_eq!(consensus.action, TradeAction::Hold);
        assert_eq!(consensus.strength, 0.0);
        assert!(!consensus.reached);
    }

    #[test]
    fn directional_tie_breaks_to_hold() {
        let opinions = vec![
            opinion(TradeAction::Buy, 0.8, 0.50),
            opinion(TradeAction::Sell, 0.8, 0.50),
        ];
        let consensus = aggregate(&opinions, 0.30);
        assert_eq!(consensus.action, TradeAction::Hold);
    }

    #[test]
    fn below_threshold_is_not_reached() {
        let opinions = vec![
            opinion(TradeAction::Buy, 0.5, 0.40),
            opinion(TradeAction::Hold, 0.2, 0.60),
        ];
        let consensus = aggregate(&opinions, 0.65);
        assert_eq!(consensus.action, TradeAction::Buy);
        assert!(consensus.strength < 0.65);
        assert!(!consensus.reached);
    }

    #[test]
    fn empty_opinion_set_holds() {
        let consensus = aggregate(&[], 0.65);
        assert_eq!(consensus.action, TradeAction::Hold);
        assert!(!consensus.reached);
    }
}
