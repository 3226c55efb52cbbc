//! Portfolio accounting
//!
//! `PortfolioState` is the only entity whose lifetime spans the whole
//! session: created at session start, mutated once per cycle by the
//! `PnLTracker` (its single writer, owned by the symbol's engine task),
//! and exposed to readers as a cloned snapshot taken at cycle start.
//!
//! Per-symbol equity is tracked against the capital allocated to the
//! symbol: base-balance deltas between cycles are treated as fills at
//! the current mid, which keeps the accounting self-consistent without
//! a fill feed.

use crate::exchange::{split_symbol, AccountSnapshot};
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session-scoped portfolio state for one symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    pub symbol: String,
    pub starting_equity: f64,
    pub equity: f64,
    pub peak_equity: f64,
    /// Open exposure in quote terms (base balance x mid price)
    pub exposure: f64,
    pub realized_pnl: f64,
    pub last_cycle_pnl: f64,
    pub trade_count: u32,
    pub wins: u32,
    pub losses: u32,
    pub cycles: u64,
    pub skipped_cycles: u64,
    pub consensus_reached: u64,
    pub updated_at: DateTime<Utc>,
}

impl PortfolioState {
    pub fn new(symbol: &str, capital: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            starting_equity: capital,
            equity: capital,
            peak_equity: capital,
            exposure: 0.0,
            realized_pnl: 0.0,
            last_cycle_pnl: 0.0,
            trade_count: 0,
            wins: 0,
            losses: 0,
            cycles: 0,
            skipped_cycles: 0,
            consensus_reached: 0,
            updated_at: Utc::now(),
        }
    }

    /// Running drawdown from the session equity peak, percent
    pub fn drawdown_pct(&self) -> f64 {
        if self.peak_equity > 0.0 {
            ((self.peak_equity - self.equity) / self.peak_equity * 100.0).max(0.0)
        } else {
            0.0
        }
    }

    pub fn win_rate(&self) -> f64 {
        let decided = self.wins + self.losses;
        if decided > 0 {
            self.wins as f64 / decided as f64
        } else {
            0.0
        }
    }

    /// Share of completed cycles whose consensus reached threshold
    pub fn consensus_rate(&self) -> f64 {
        if self.cycles > 0 {
            self.consensus_reached as f64 / self.cycles as f64
        } else {
            0.0
        }
    }
}

/// Single writer of `PortfolioState`, owned by the engine task
pub struct PnLTracker {
    state: PortfolioState,
    base_asset: String,
    /// Quote capital attributed to this symbol, adjusted by fills
    quote_alloc: f64,
    /// Base balance seen last cycle; None until the first update
    last_base_balance: Option<f64>,
}

impl PnLTracker {
    pub fn new(symbol: &str, capital: f64) -> Self {
        let (base_asset, _) = split_symbol(symbol);
        Self {
            state: PortfolioState::new(symbol, capital),
            base_asset,
            quote_alloc: capital,
            last_base_balance: None,
        }
    }

    /// Consistent snapshot for readers (risk gate, reporting)
    pub fn snapshot(&self) -> PortfolioState {
        self.state.clone()
    }

    /// Update balances/PnL from the exchange account after order work
    ///
    /// Base-balance deltas since the previous cycle are valued at the
    /// current mid; wins/losses count cycles where fills occurred.
    pub fn update(&mut self, account: &AccountSnapshot, snapshot: &MarketSnapshot) {
        let base_balance = account.balance_of(&self.base_asset);

        if let Some(previous) = self.last_base_balance {
            let delta = base_balance - previous;
            if delta.abs() > f64::EPSILON {
                self.quote_alloc -= delta * snapshot.price;
                self.state.trade_count += 1;
            }
        }
        self.last_base_balance = Some(base_balance);

        self.state.exposure = base_balance * snapshot.price;
        let equity = self.quote_alloc + self.state.exposure;

        let cycle_pnl = equity - self.state.equity;
        self.state.last_cycle_pnl = cycle_pnl;
        if cycle_pnl > 0.0 {
            self.state.wins += 1;
        } else if cycle_pnl < 0.0 {
            self.state.losses += 1;
        }

        self.state.equity = equity;
        self.state.peak_equity = self.state.peak_equity.max(equity);
        self.state.realized_pnl = equity - self.state.starting_equity;
        self.state.updated_at = Utc::now();

        logger::debug(
            LogTag::Portfolio,
            &format!(
                "{}: equity={:.2} exposure={:.2} dd={:.2}% pnl={:+.4}",
                self.state.symbol,
                equity,
                self.state.exposure,
                self.state.drawdown_pct(),
                cycle_pnl
            ),
        );
    }

    pub fn record_cycle(&mut self, consensus_reached: bool) {
        self.state.cycles += 1;
        if consensus_reached {
            self.state.consensus_reached += 1;
        }
        self.state.updated_at = Utc::now();
    }

    pub fn record_skipped_cycle(&mut self) {
        self.state.cycles += 1;
        self.state.skipped_cycles += 1;
        self.state.updated_at = Utc::now();
    }
}
