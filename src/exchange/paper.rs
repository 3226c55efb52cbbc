//! In-process simulated exchange for paper trading
//!
//! Engages when no API credentials are configured (or --paper is set)
//! so the whole decision loop stays exercisable end to end. Each
//! symbol gets a random-walk mid price; resting limit orders fill in
//! full when the walk crosses their price, adjusting the simulated
//! balances the same way real fills would.

use super::types::*;
use super::{split_symbol, ExchangeApi};
use crate::config::with_config;
use crate::errors::SwarmBotError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::{HashMap, VecDeque};

/// Closes kept per symbol for the volatility/SMA windows
const CLOSE_HISTORY: usize = 60;

/// Per-tick random walk scale
const WALK_SIGMA: f64 = 0.0008;

/// Simulated half-spread as a fraction of mid
const HALF_SPREAD: f64 = 0.0002;

struct PaperBook {
    mid: f64,
    closes: VecDeque<f64>,
    orders: Vec<OpenOrder>,
}

struct PaperState {
    books: HashMap<String, PaperBook>,
    balances: HashMap<String, f64>,
    next_order_id: u64,
}

pub struct PaperExchange {
    state: Mutex<PaperState>,
}

impl PaperExchange {
    pub fn from_config() -> Self {
        let (symbols, capital) =
            with_config(|cfg| (cfg.engine.symbols.clone(), cfg.engine.capital_per_symbol));

        logger::info(
            LogTag::Exchange,
            "No API credentials - running against the paper exchange",
        );

        let mut state = PaperState {
            books: HashMap::new(),
            balances: HashMap::new(),
            next_order_id: 1,
        };

        for symbol in &symbols {
            let (_, quote) = split_symbol(symbol);
            *state.balances.entry(quote).or_insert(0.0) += capital;
            state.books.insert(symbol.clone(), Self::seed_book());
        }

        Self {
            state: Mutex::new(state),
        }
    }

    /// Seed a book with an initial walk so SMA windows have history
    fn seed_book() -> PaperBook {
        let mut rng = rand::thread_rng();
        let mut mid = 100.0;
        let mut closes = VecDeque::with_capacity(CLOSE_HISTORY);
        for _ in 0..CLOSE_HISTORY {
            mid *= 1.0 + rng.gen_range(-WALK_SIGMA..WALK_SIGMA);
            closes.push_back(mid);
        }
        PaperBook {
            mid,
            closes,
            orders: Vec::new(),
        }
    }

    /// Advance the walk one tick and fill any crossed orders
    fn tick(state: &mut PaperState, symbol: &str) -> Result<f64, SwarmBotError> {
        let step = {
            let mut rng = rand::thread_rng();
            rng.gen_range(-WALK_SIGMA..WALK_SIGMA)
        };

        let (base, quote) = split_symbol(symbol);

        let book = state
            .books
            .get_mut(symbol)
            .ok_or_else(|| SwarmBotError::validation(format!("unknown symbol {}", symbol)))?;

        book.mid *= 1.0 + step;
        book.closes.push_back(book.mid);
        while book.closes.len() > CLOSE_HISTORY {
            book.closes.pop_front();
        }

        let mid = book.mid;
        let mut fills = Vec::new();
        book.orders.retain(|order| {
            let crossed = match order.side {
                OrderSide::Buy => mid <= order.price,
                OrderSide::Sell => mid >= order.price,
            };
            if crossed {
                fills.push(order.clone());
            }
            !crossed
        });

        for fill in fills {
            let notional = fill.price * fill.orig_qty;
            match fill.side {
                OrderSide::Buy => {
                    *state.balances.entry(quote.clone()).or_insert(0.0) -= notional;
                    *state.balances.entry(base.clone()).or_insert(0.0) += fill.orig_qty;
                }
                OrderSide::Sell => {
                    *state.balances.entry(base.clone()).or_insert(0.0) -= fill.orig_qty;
                    *state.balances.entry(quote.clone()).or_insert(0.0) += notional;
                }
            }
        }

        Ok(mid)
    }
}

#[async_trait]
impl ExchangeApi for PaperExchange {
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, SwarmBotError> {
        let mut state = self.state.lock();
        let mid = Self::tick(&mut state, symbol)?;

        Ok(BookTicker {
            symbol: symbol.to_string(),
            bid_price: mid * (1.0 - HALF_SPREAD),
            bid_qty: 1.0,
            ask_price: mid * (1.0 + HALF_SPREAD),
            ask_qty: 1.0,
        })
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, SwarmBotError> {
        let state = self.state.lock();
        let book = state
            .books
            .get(symbol)
            .ok_or_else(|| SwarmBotError::validation(format!("unknown symbol {}", symbol)))?;

        let skip = book.closes.len().saturating_sub(limit);
        Ok(book.closes.iter().skip(skip).copied().collect())
    }

    async fn account(&self) -> Result<AccountSnapshot, SwarmBotError> {
        let state = self.state.lock();
        let balances = state
            .balances
            .iter()
            .map(|(asset, total)| AssetBalance {
                asset: asset.clone(),
                free: *total,
                locked: 0.0,
            })
            .collect();

        Ok(AccountSnapshot { balances })
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SwarmBotError> {
        let state = self.state.lock();
        Ok(state
            .books
            .get(symbol)
            .map(|b| b.orders.clone())
            .unwrap_or_default())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, SwarmBotError> {
        if request.quantity <= 0.0 || request.price <= 0.0 {
            return Err(SwarmBotError::Exchange {
                status: 400,
                body: "invalid price or quantity".to_string(),
            });
        }

        let mut state = self.state.lock();
        let order_id = state.next_order_id.to_string();
        state.next_order_id += 1;

        let book = state.books.get_mut(&request.symbol).ok_or_else(|| {
            SwarmBotError::validation(format!("unknown symbol {}", request.symbol))
        })?;

        book.orders.push(OpenOrder {
            order_id: order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            orig_qty: request.quantity,
            executed_qty: 0.0,
        });

        Ok(PlacedOrder {
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            quantity: request.quantity,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), SwarmBotError> {
        let mut state = self.state.lock();
        if let Some(book) = state.books.get_mut(symbol) {
            book.orders.retain(|o| o.order_id != order_id);
        }
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize, SwarmBotError> {
        let mut state = self.state.lock();
        let book = state
            .books
            .get_mut(symbol)
            .ok_or_else(|| SwarmBotError::validation(format!("unknown symbol {}", symbol)))?;

        let cancelled = book.orders.len();
        book.orders.clear();
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper_with_symbol(symbol: &str) -> PaperExchange {
        let mut state = PaperState {
            books: HashMap::new(),
            balances: HashMap::new(),
            next_order_id: 1,
        };
        let (_, quote) = split_symbol(symbol);
        state.balances.insert(quote, 1000.0);
        state.books.insert(symbol.to_string(), PaperExchange::seed_book());
        PaperExchange {
            state: Mutex::new(state),
        }
    }

    #[tokio::test]
    async fn cancel_all_empties_the_book() {
        let paper = paper_with_symbol("BTCUSDT");
        let ticker = paper.book_ticker("BTCUSDT").await.unwrap();

        // Rest far from the mid so the order cannot fill immediately
        paper
            .place_order(&OrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                price: ticker.mid() * 0.5,
                quantity: 1.0,
            })
            .await
            .unwrap();

        assert_eq!(paper.open_orders("BTCUSDT").await.unwrap().len(), 1);
        assert_eq!(paper.cancel_all_orders("BTCUSDT").await.unwrap(), 1);
        assert!(paper.open_orders("BTCUSDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_zero_quantity_orders() {
        let paper = paper_with_symbol("BTCUSDT");
        let result = paper
            .place_order(&OrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                price: 100.0,
                quantity: 0.0,
            })
            .await;
        assert!(matches!(
            result,
            Err(SwarmBotError::Exchange { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn crossed_buy_order_fills_and_moves_balances() {
        let paper = paper_with_symbol("BTCUSDT");
        let ticker = paper.book_ticker("BTCUSDT").await.unwrap();

        // A buy resting far above the mid is crossed on the next tick
        paper
            .place_order(&OrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                price: ticker.mid() * 2.0,
                quantity: 1.0,
            })
            .await
            .unwrap();

        let _ = paper.book_ticker("BTCUSDT").await.unwrap();

        let account = paper.account().await.unwrap();
        assert!(account.balance_of("BTC") > 0.0);
        assert!(paper.open_orders("BTCUSDT").await.unwrap().is_empty());
    }
}
