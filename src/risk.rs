//! Risk gate
//!
//! Last word before any order reaches the exchange. Rules are applied
//! in a fixed order so the most severe outcome always wins:
//!
//! 1. consensus EmergencyStop passes through as EmergencyStop
//! 2. no consensus reached rejects the cycle
//! 3. drawdown at or past the limit halts the session regardless of
//!    how strong the consensus is
//! 4. strength below the minimum confidence rejects
//! 5. a Buy that would push exposure past the position limit is
//!    resized down (never up)

use crate::config::with_config;
use crate::consensus::Consensus;
use crate::logger::{self, LogTag};
use crate::portfolio::PortfolioState;
use crate::swarm::TradeAction;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RiskDecision {
    Approve,
    /// Scale the proposed ladder notional by this factor in (0, 1)
    Resize { factor: f64 },
    Reject { reason: String },
    EmergencyStop { reason: String },
}

pub struct RiskGate {
    max_drawdown_pct: f64,
    min_confidence: f64,
    max_position_size: f64,
}

impl RiskGate {
    pub fn from_config() -> Self {
        with_config(|cfg| Self {
            max_drawdown_pct: cfg.risk.max_drawdown_pct,
            min_confidence: cfg.risk.min_confidence,
            max_position_size: cfg.risk.max_position_size,
        })
    }

    #[cfg(test)]
    pub fn with_limits(max_drawdown_pct: f64, min_confidence: f64, max_position_size: f64) -> Self {
        Self {
            max_drawdown_pct,
            min_confidence,
            max_position_size,
        }
    }

    /// Gate one cycle's consensus; `proposed_notional` is the quote
    /// value the order ladder intends to commit
    pub fn evaluate(
        &self,
        consensus: &Consensus,
        portfolio: &PortfolioState,
        proposed_notional: f64,
    ) -> RiskDecision {
        if consensus.action == TradeAction::EmergencyStop {
            return RiskDecision::EmergencyStop {
                reason: "consensus voted emergency stop".to_string(),
            };
        }

        if !consensus.reached {
            return RiskDecision::Reject {
                reason: "no consensus".to_string(),
            };
        }

        let drawdown = portfolio.drawdown_pct();
        if drawdown >= self.max_drawdown_pct {
            logger::warning(
                LogTag::Risk,
                &format!(
                    "{}: drawdown {:.2}% at limit {:.2}%, halting",
                    portfolio.symbol, drawdown, self.max_drawdown_pct
                ),
            );
            return RiskDecision::EmergencyStop {
                reason: format!("drawdown {:.2}% breached limit", drawdown),
            };
        }

        if consensus.strength < self.min_confidence {
            return RiskDecision::Reject {
                reason: "low confidence".to_string(),
            };
        }

        if consensus.action == TradeAction::Buy && proposed_notional > 0.0 {
            let headroom = self.max_position_size - portfolio.exposure;
            if headroom <= 0.0 {
                return RiskDecision::Reject {
                    reason: "exposure at position limit".to_string(),
                };
            }
            if proposed_notional > headroom {
                let factor = headroom / proposed_notional;
                logger::info(
                    LogTag::Risk,
                    &format!(
                        "{}: resizing ladder by {:.3} to respect position limit",
                        portfolio.symbol, factor
                    ),
                );
                return RiskDecision::Resize { factor };
            }
        }

        RiskDecision::Approve
    }
}
