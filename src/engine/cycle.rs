//! One decision cycle for one symbol
//!
//! Snapshot -> opinions -> consensus -> risk gate -> order lifecycle
//! -> accounting -> experience. Any error inside the cycle makes it a
//! no-op (counted as skipped); the symbol task decides what to do
//! with an emergency outcome.

use crate::consensus;
use crate::errors::SwarmBotError;
use crate::events::{self, Severity};
use crate::exchange::ExchangeApi;
use crate::learning::{market_features, Experience, Learner};
use crate::logger::{self, LogTag};
use crate::market::{self, MarketSnapshot};
use crate::orders::OrderLifecycle;
use crate::portfolio::PnLTracker;
use crate::risk::{RiskDecision, RiskGate};
use crate::swarm::{Opinion, Swarm, TradeAction};
use super::session::SessionControl;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

/// Decision carried from one cycle to the next so the reward it
/// produced can be attributed back to it
struct PendingExperience {
    features: Vec<f64>,
    action: TradeAction,
    opinions: Vec<Opinion>,
    equity_before: f64,
}

/// Everything a symbol task needs per cycle, owned by that task
pub struct CycleContext {
    pub symbol: String,
    pub exchange: Arc<dyn ExchangeApi>,
    pub swarm: Swarm,
    pub gate: RiskGate,
    pub lifecycle: OrderLifecycle,
    pub tracker: PnLTracker,
    pub learner: Arc<Mutex<Learner>>,
    pub control: Arc<SessionControl>,
    pub consensus_threshold: f64,
    pending: Option<PendingExperience>,
}

impl CycleContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: String,
        exchange: Arc<dyn ExchangeApi>,
        swarm: Swarm,
        gate: RiskGate,
        lifecycle: OrderLifecycle,
        tracker: PnLTracker,
        learner: Arc<Mutex<Learner>>,
        control: Arc<SessionControl>,
        consensus_threshold: f64,
    ) -> Self {
        Self {
            symbol,
            exchange,
            swarm,
            gate,
            lifecycle,
            tracker,
            learner,
            control,
            consensus_threshold,
            pending: None,
        }
    }

    /// Preemptive emergency handling: cancel everything, place nothing
    async fn bail_out(&self) -> CycleOutcome {
        let _ = self.exchange.cancel_all_orders(&self.symbol).await;
        CycleOutcome {
            emergency: true,
            failed: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub emergency: bool,
    pub failed: bool,
}

/// Run one full cycle; `cycle_number` drives the training cadence
pub async fn run_cycle(
    ctx: &mut CycleContext,
    cycle_number: u64,
) -> Result<CycleOutcome, SwarmBotError> {
    // Emergency is preemptive: checked around every blocking call
    if ctx.control.emergency_triggered() {
        return Ok(ctx.bail_out().await);
    }

    // No data, no action: a failed snapshot aborts before any opinion
    let snapshot = market::fetch_snapshot(ctx.exchange.as_ref(), &ctx.symbol).await?;

    if ctx.control.emergency_triggered() {
        return Ok(ctx.bail_out().await);
    }

    let portfolio = ctx.tracker.snapshot();
    let opinions = ctx.swarm.collect(&snapshot, &portfolio).await;

    if ctx.control.emergency_triggered() {
        return Ok(ctx.bail_out().await);
    }
    let decision_consensus = consensus::aggregate(&opinions, ctx.consensus_threshold);

    logger::info(
        LogTag::Consensus,
        &format!(
            "{} cycle {}: {} strength={:.3} reached={}",
            ctx.symbol,
            cycle_number,
            decision_consensus.action.as_str(),
            decision_consensus.strength,
            decision_consensus.reached
        ),
    );

    let decision = ctx
        .gate
        .evaluate(&decision_consensus, &portfolio, ctx.lifecycle.proposed_notional());

    if let RiskDecision::Reject { reason } = &decision {
        logger::debug(
            LogTag::Risk,
            &format!("{} cycle {}: rejected ({})", ctx.symbol, cycle_number, reason),
        );
    }

    let report = ctx
        .lifecycle
        .apply(
            ctx.exchange.as_ref(),
            &snapshot,
            &decision,
            decision_consensus.action,
        )
        .await;

    if report.failed() {
        events::record_order_event(
            "cycle_failed",
            Severity::Warning,
            &ctx.symbol,
            json!({
                "cycle": cycle_number,
                "cancelled": report.cancelled,
                "placed": report.placed,
                "attempted": report.attempted,
                "cancel_failed": report.cancel_failed,
            }),
        );
    }

    // The emergency outcome is settled by the risk decision; nothing
    // after this point may swallow it, or the session would keep
    // trading past a halt
    let emergency = matches!(decision, RiskDecision::EmergencyStop { .. });
    if emergency {
        let reason = match &decision {
            RiskDecision::EmergencyStop { reason } => reason.clone(),
            _ => String::new(),
        };
        events::record_engine_event(
            "emergency_stop",
            Severity::Critical,
            Some(&ctx.symbol),
            json!({ "cycle": cycle_number, "reason": reason }),
        );
    }

    // Refresh accounting from the exchange after the order work. The
    // snapshot fetch is the only abort point of the cycle; a failed
    // refresh just defers accounting to the next cycle.
    match ctx.exchange.account().await {
        Ok(account) => ctx.tracker.update(&account, &snapshot),
        Err(e) => {
            logger::warning(
                LogTag::Portfolio,
                &format!(
                    "{} cycle {}: account refresh failed, accounting deferred: {}",
                    ctx.symbol, cycle_number, e
                ),
            );
        }
    }
    ctx.tracker.record_cycle(decision_consensus.reached);

    record_experience(ctx, &snapshot, &decision_consensus.action, opinions);
    ctx.learner.lock().maybe_train(cycle_number);

    Ok(CycleOutcome {
        emergency,
        failed: report.failed(),
    })
}

/// Close out last cycle's pending experience with the reward this
/// cycle observed, then stage the current decision
fn record_experience(
    ctx: &mut CycleContext,
    snapshot: &MarketSnapshot,
    action: &TradeAction,
    opinions: Vec<Opinion>,
) {
    let features = market_features(snapshot);
    let state = ctx.tracker.snapshot();

    if let Some(pending) = ctx.pending.take() {
        let capital = state.starting_equity.max(f64::EPSILON);
        let reward = (state.equity - pending.equity_before) / capital;

        ctx.learner.lock().record(Experience {
            symbol: ctx.symbol.clone(),
            features: pending.features,
            action: pending.action,
            reward,
            next_features: features.clone(),
            opinions: pending.opinions,
            timestamp: Utc::now(),
        });
    }

    ctx.pending = Some(PendingExperience {
        features,
        action: *action,
        opinions,
        equity_before: state.equity,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{
        AccountSnapshot, BookTicker, OpenOrder, OrderRequest, PlacedOrder,
    };
    use crate::learning::new_shared_model;
    use crate::orders::LadderParams;
    use crate::swarm::{OpinionSource, SourceWeights};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct HaltedExchange {
        cancel_all_called: AtomicBool,
    }

    #[async_trait]
    impl ExchangeApi for HaltedExchange {
        async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, crate::errors::SwarmBotError> {
            Ok(BookTicker {
                symbol: symbol.to_string(),
                bid_price: 99.99,
                bid_qty: 1.0,
                ask_price: 100.01,
                ask_qty: 1.0,
            })
        }

        async fn recent_closes(
            &self,
            _: &str,
            limit: usize,
        ) -> Result<Vec<f64>, crate::errors::SwarmBotError> {
            Ok(vec![100.0; limit])
        }

        async fn account(&self) -> Result<AccountSnapshot, crate::errors::SwarmBotError> {
            Err(crate::errors::SwarmBotError::transient("account unavailable"))
        }

        async fn open_orders(&self, _: &str) -> Result<Vec<OpenOrder>, crate::errors::SwarmBotError> {
            Ok(Vec::new())
        }

        async fn place_order(
            &self,
            request: &OrderRequest,
        ) -> Result<PlacedOrder, crate::errors::SwarmBotError> {
            Ok(PlacedOrder {
                order_id: "1".to_string(),
                symbol: request.symbol.clone(),
                side: request.side,
                price: request.price,
                quantity: request.quantity,
            })
        }

        async fn cancel_order(&self, _: &str, _: &str) -> Result<(), crate::errors::SwarmBotError> {
            Ok(())
        }

        async fn cancel_all_orders(&self, _: &str) -> Result<usize, crate::errors::SwarmBotError> {
            self.cancel_all_called.store(true, Ordering::SeqCst);
            Ok(0)
        }
    }

    struct HaltSource;

    #[async_trait]
    impl OpinionSource for HaltSource {
        fn name(&self) -> &'static str {
            "technical"
        }

        async fn evaluate(
            &self,
            _: &crate::market::MarketSnapshot,
            _: &crate::portfolio::PortfolioState,
        ) -> Opinion {
            Opinion::new("technical", TradeAction::EmergencyStop, 1.0)
        }
    }

    #[tokio::test]
    async fn emergency_outcome_survives_account_refresh_failure() {
        let exchange = Arc::new(HaltedExchange {
            cancel_all_called: AtomicBool::new(false),
        });
        let weights = SourceWeights::from_config();
        let model = new_shared_model();

        let mut ctx = CycleContext::new(
            "BTCUSDT".to_string(),
            exchange.clone(),
            Swarm::with_sources(vec![Box::new(HaltSource)], weights.clone()),
            RiskGate::with_limits(10.0, 0.5, 300.0),
            OrderLifecycle::new(LadderParams {
                capital: 1000.0,
                levels: 3,
                base_spread: 0.0015,
                min_notional: 10.0,
            }),
            PnLTracker::new("BTCUSDT", 1000.0),
            Arc::new(Mutex::new(Learner::from_config(model, weights))),
            Arc::new(SessionControl::new()),
            0.65,
        );

        let outcome = run_cycle(&mut ctx, 1).await.expect("cycle must not abort");
        assert!(outcome.emergency);
        assert!(exchange.cancel_all_called.load(Ordering::SeqCst));
        // The cycle still counts even though accounting was deferred
        assert_eq!(ctx.tracker.snapshot().cycles, 1);
    }
}
