//! Shared swarm vocabulary: actions and opinions

use serde::{Deserialize, Serialize};

/// Action an opinion source (or the consensus) votes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
    EmergencyStop,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Hold => "hold",
            TradeAction::EmergencyStop => "emergency_stop",
        }
    }
}

/// One source's vote for the current cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opinion {
    pub source: String,
    pub action: TradeAction,
    /// Self-assessed confidence in [0, 1]; 0 abstains
    pub confidence: f64,
    /// Source weight at collection time (learner-adjusted)
    pub weight: f64,
}

impl Opinion {
    pub fn new(source: &str, action: TradeAction, confidence: f64) -> Self {
        Self {
            source: source.to_string(),
            action,
            confidence: confidence.clamp(0.0, 1.0),
            weight: 0.0,
        }
    }

    /// Abstention: Hold at zero confidence
    pub fn abstain(source: &str) -> Self {
        Self::new(source, TradeAction::Hold, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(Opinion::new("technical", TradeAction::Buy, 1.7).confidence, 1.0);
        assert_eq!(Opinion::new("technical", TradeAction::Buy, -0.3).confidence, 0.0);
    }

    #[test]
    fn abstain_is_zero_confidence_hold() {
        let op = Opinion::abstain("sentiment");
        assert_eq!(op.action, TradeAction::Hold);
        assert_eq!(op.confidence, 0.0);
    }
}
