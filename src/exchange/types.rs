//! Wire-facing exchange types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

/// Best bid/ask snapshot for one symbol
#[derive(Debug, Clone)]
pub struct BookTicker {
    pub symbol: String,
    pub bid_price: f64,
    pub bid_qty: f64,
    pub ask_price: f64,
    pub ask_qty: f64,
}

impl BookTicker {
    /// Mid price between best bid and ask
    pub fn mid(&self) -> f64 {
        (self.bid_price + self.ask_price) / 2.0
    }

    /// Spread as a fraction of mid price
    pub fn spread_fraction(&self) -> f64 {
        let mid = self.mid();
        if mid > 0.0 {
            (self.ask_price - self.bid_price) / mid
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: f64,
    pub locked: f64,
}

impl AssetBalance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Account balances at a point in time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balances: Vec<AssetBalance>,
}

impl AccountSnapshot {
    pub fn balance_of(&self, asset: &str) -> f64 {
        self.balances
            .iter()
            .find(|b| b.asset == asset)
            .map(|b| b.total())
            .unwrap_or(0.0)
    }
}

/// An order resting on the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub orig_qty: f64,
    pub executed_qty: f64,
}

/// A limit order about to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}

/// Acknowledgement for a placed order
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: f64,
    pub quantity: f64,
}
