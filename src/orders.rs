//! Order lifecycle: cancel-then-replace ladder
//!
//! Every cycle starts by cancelling all open orders for the symbol,
//! regardless of what the risk gate decided, so stale quotes never
//! outlive the cycle that placed them. Placement only happens on an
//! approved (or resized) directional decision; each ladder level is
//! placed independently so one rejected level does not abort the
//! rest. A failed cancel-all skips placement entirely and marks the
//! cycle failed; the next cycle retries from scratch.

use crate::config::with_config;
use crate::errors::SwarmBotError;
use crate::exchange::{ExchangeApi, OrderRequest, OrderSide};
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::risk::RiskDecision;
use crate::swarm::TradeAction;
use serde::Serialize;

/// Ladder construction parameters, fixed per session
#[derive(Debug, Clone)]
pub struct LadderParams {
    pub capital: f64,
    pub levels: usize,
    /// Per-level price offset as a fraction of mid
    pub base_spread: f64,
    pub min_notional: f64,
}

impl LadderParams {
    pub fn from_config() -> Self {
        with_config(|cfg| Self {
            capital: cfg.engine.capital_per_symbol,
            levels: cfg.engine.order_levels,
            base_spread: cfg.engine.base_spread_pct / 100.0,
            min_notional: cfg.engine.min_order_notional,
        })
    }
}

/// What one cycle did to the order book
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleOrders {
    pub cancelled: usize,
    pub attempted: usize,
    pub placed: usize,
    pub cancel_failed: bool,
}

impl CycleOrders {
    /// A cycle fails if cancellation failed or any level was refused
    pub fn failed(&self) -> bool {
        self.cancel_failed || self.placed < self.attempted
    }
}

pub struct OrderLifecycle {
    params: LadderParams,
}

impl OrderLifecycle {
    pub fn new(params: LadderParams) -> Self {
        Self { params }
    }

    pub fn from_config() -> Self {
        Self::new(LadderParams::from_config())
    }

    /// Total quote notional a full ladder would commit
    pub fn proposed_notional(&self) -> f64 {
        self.params.capital
    }

    /// Build the ladder for a directional action
    ///
    /// Level i quotes at i x base_spread away from mid, buys below and
    /// sells above. Capital splits evenly across levels and is scaled
    /// by the risk gate's resize factor; levels whose notional falls
    /// under the exchange minimum are dropped.
    pub fn build_ladder(
        &self,
        snapshot: &MarketSnapshot,
        action: TradeAction,
        factor: f64,
    ) -> Vec<OrderRequest> {
        let side = match action {
            TradeAction::Buy => OrderSide::Buy,
            TradeAction::Sell => OrderSide::Sell,
            _ => return Vec::new(),
        };

        if self.params.levels == 0 || snapshot.price <= 0.0 {
            return Vec::new();
        }

        let per_level_notional = self.params.capital * factor / self.params.levels as f64;
        let mut ladder = Vec::with_capacity(self.params.levels);

        for level in 1..=self.params.levels {
            let offset = self.params.base_spread * level as f64;
            let price = match side {
                OrderSide::Buy => snapshot.price * (1.0 - offset),
                OrderSide::Sell => snapshot.price * (1.0 + offset),
            };
            if price <= 0.0 {
                continue;
            }

            if per_level_notional < self.params.min_notional {
                continue;
            }

            ladder.push(OrderRequest {
                symbol: snapshot.symbol.clone(),
                side,
                price,
                quantity: per_level_notional / price,
            });
        }

        ladder
    }

    /// Run the full cancel-then-replace pass for one cycle
    pub async fn apply(
        &self,
        exchange: &dyn ExchangeApi,
        snapshot: &MarketSnapshot,
        decision: &RiskDecision,
        action: TradeAction,
    ) -> CycleOrders {
        let mut report = CycleOrders::default();

        // Cancellation is unconditional; even a rejected cycle must
        // not leave last cycle's quotes resting
        match exchange.cancel_all_orders(&snapshot.symbol).await {
            Ok(cancelled) => {
                report.cancelled = cancelled;
                if cancelled > 0 {
                    logger::debug(
                        LogTag::Orders,
                        &format!("{}: cancelled {} stale orders", snapshot.symbol, cancelled),
                    );
                }
            }
            Err(e) => {
                logger::warning(
                    LogTag::Orders,
                    &format!(
                        "{}: cancel-all failed, skipping placement: {}",
                        snapshot.symbol, e
                    ),
                );
                report.cancel_failed = true;
                return report;
            }
        }

        let factor = match decision {
            RiskDecision::Approve => 1.0,
            RiskDecision::Resize { factor } => *factor,
            // Reject and EmergencyStop are cancel-only cycles
            _ => return report,
        };

        let ladder = self.build_ladder(snapshot, action, factor);
        if ladder.is_empty() {
            if matches!(action, TradeAction::Buy | TradeAction::Sell) {
                logger::info(
                    LogTag::Orders,
                    &format!(
                        "{}: resized ladder fell under min notional, nothing to place",
                        snapshot.symbol
                    ),
                );
            }
            return report;
        }

        report.attempted = ladder.len();
        for request in &ladder {
            match exchange.place_order(request).await {
                Ok(placed) => {
                    report.placed += 1;
                    logger::debug(
                        LogTag::Orders,
                        &format!(
                            "{}: placed {} {:.6} @ {:.6} (id {})",
                            request.symbol,
                            request.side.as_str(),
                            placed.quantity,
                            placed.price,
                            placed.order_id
                        ),
                    );
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Orders,
                        &format!(
                            "{}: level {:.6} @ {:.6} refused: {}",
                            request.symbol, request.quantity, request.price, e
                        ),
                    );
                }
            }
        }

        if report.placed < report.attempted {
            let partial = SwarmBotError::PartialExecution {
                placed: report.placed,
                attempted: report.attempted,
            };
            logger::warning(LogTag::Orders, &format!("{}: {}", snapshot.symbol, partial));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{
        AccountSnapshot, AssetBalance, BookTicker, OpenOrder, PlacedOrder,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockExchange {
        calls: Mutex<Vec<String>>,
        fail_cancel: bool,
        fail_place_first: bool,
    }

    #[async_trait]
    impl ExchangeApi for MockExchange {
        async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, SwarmBotError> {
            Ok(BookTicker {
                symbol: symbol.to_string(),
                bid_price: 99.99,
                bid_qty: 1.0,
                ask_price: 100.01,
                ask_qty: 1.0,
            })
        }

        async fn recent_closes(&self, _: &str, limit: usize) -> Result<Vec<f64>, SwarmBotError> {
            Ok(vec![100.0; limit])
        }

        async fn account(&self) -> Result<AccountSnapshot, SwarmBotError> {
            Ok(AccountSnapshot {
                balances: vec![AssetBalance {
                    asset: "USDT".to_string(),
                    free: 1000.0,
                    locked: 0.0,
                }],
            })
        }

        async fn open_orders(&self, _: &str) -> Result<Vec<OpenOrder>, SwarmBotError> {
            Ok(Vec::new())
        }

        async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, SwarmBotError> {
            let mut calls = self.calls.lock();
            let first_place = !calls.iter().any(|c| c.starts_with("place"));
            calls.push(format!("place {:.4}", request.price));

            if self.fail_place_first && first_place {
                return Err(SwarmBotError::Exchange {
                    status: 400,
                    body: "refused".to_string(),
                });
            }

            Ok(PlacedOrder {
                order_id: "1".to_string(),
                symbol: request.symbol.clone(),
                side: request.side,
                price: request.price,
                quantity: request.quantity,
            })
        }

        async fn cancel_order(&self, _: &str, _: &str) -> Result<(), SwarmBotError> {
            Ok(())
        }

        async fn cancel_all_orders(&self, _: &str) -> Result<usize, SwarmBotError> {
            self.calls.lock().push("cancel_all".to_string());
            if self.fail_cancel {
                return Err(SwarmBotError::transient("cancel blew up"));
            }
            Ok(2)
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

    fn lifecycle() -> OrderLifecycle {
        OrderLifecycle::new(LadderParams {
            capital: 1000.0,
            levels: 3,
            base_spread: 0.0015,
            min_notional: 10.0,
        })
    }

    #[test]
    fn buy_ladder_quotes_below_mid() {
        let ladder = lifecycle().build_ladder(&snapshot(), TradeAction::Buy, 1.0);
        assert_eq!(ladder.len(), 3);
        for (i, order) in ladder.iter().enumerate() {
            let expected = 100.0 * (1.0 - 0.0015 * (i + 1) as f64);
            assert!((order.price - expected).abs() < 1e-9);
            assert!(order.price < 100.0);
            // Even capital split across levels
            assert!((order.price * order.quantity - 1000.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn sell_ladder_quotes_above_mid() {
        let ladder = lifecycle().build_ladder(&snapshot(), TradeAction::Sell, 1.0);
        assert_eq!(ladder.len(), 3);
        assert!(ladder.iter().all(|o| o.price > 100.0));
    }

    #[test]
    fn hold_builds_no_ladder() {
        assert!(lifecycle()
            .build_ladder(&snapshot(), TradeAction::Hold, 1.0)
            .is_empty());
    }

    #[test]
    fn resize_below_min_notional_drops_all_levels() {
        // 1000 * 0.02 / 3 levels = 6.67 per level, under the 10 minimum
        let ladder = lifecycle().build_ladder(&snapshot(), TradeAction::Buy, 0.02);
        assert!(ladder.is_empty());
    }

    #[tokio::test]
    async fn cancel_runs_before_placement() {
        let mock = MockExchange::default();
        let report = lifecycle()
            .apply(&mock, &snapshot(), &RiskDecision::Approve, TradeAction::Buy)
            .await;

        let calls = mock.calls.lock();
        assert_eq!(calls[0], "cancel_all");
        assert_eq!(calls.iter().filter(|c| c.starts_with("place")).count(), 3);
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.placed, 3);
        assert!(!report.failed());
    }

    #[tokio::test]
    async fn rejected_cycle_still_cancels() {
        let mock = MockExchange::default();
        let report = lifecycle()
            .apply(
                &mock,
                &snapshot(),
                &RiskDecision::Reject {
                    reason: "low confidence".to_string(),
                },
                TradeAction::Buy,
            )
            .await;

        let calls = mock.calls.lock();
        assert_eq!(calls.as_slice(), &["cancel_all".to_string()]);
        assert_eq!(report.cancelled, 2);
        assert_eq!(report.placed, 0);
    }

    #[tokio::test]
    async fn cancel_failure_skips_placement_and_fails_cycle() {
        let mock = MockExchange {
            fail_cancel: true,
            ..Default::default()
        };
        let report = lifecycle()
            .apply(&mock, &snapshot(), &RiskDecision::Approve, TradeAction::Buy)
            .await;

        let calls = mock.calls.lock();
        assert!(!calls.iter().any(|c| c.starts_with("place")));
        assert!(report.cancel_failed);
        assert!(report.failed());
    }

    #[tokio::test]
    async fn one_refused_level_does_not_abort_the_rest() {
        let mock = MockExchange {
            fail_place_first: true,
            ..Default::default()
        };
        let report = lifecycle()
            .apply(&mock, &snapshot(), &RiskDecision::Approve, TradeAction::Buy)
            .await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.placed, 2);
        assert!(report.failed());
    }

    #[tokio::test]
    async fn resized_ladder_scales_notional() {
        let mock = MockExchange::default();
        let report = lifecycle()
            .apply(
                &mock,
                &snapshot(),
                &RiskDecision::Resize { factor: 0.5 },
                TradeAction::Buy,
            )
            .await;
        assert_eq!(report.placed, 3);

        // Half the capital, still split across 3 levels
        let ladder = lifecycle().build_ladder(&snapshot(), TradeAction::Buy, 0.5);
        let total: f64 = ladder.iter().map(|o| o.price * o.quantity).sum();
        assert!((total - 500.0).abs() < 1e-6);
    }
}
