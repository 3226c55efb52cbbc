//! Signed REST client for a Binance-style spot API
//!
//! All prices/quantities arrive as JSON strings and are parsed into
//! f64 at this boundary. Transient failures (timeout, connect, 429,
//! 5xx) are retried exactly once; anything else surfaces as a
//! component-level error for the cycle to absorb.

use super::sign::sign_query;
use super::types::*;
use super::ExchangeApi;
use crate::arguments::is_debug_exchange_enabled;
use crate::config::with_config;
use crate::errors::SwarmBotError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;

pub struct RestExchange {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
    timeout_ms: u64,
}

enum Method {
    Get,
    Post,
    Delete,
}

impl RestExchange {
    pub fn from_config() -> Self {
        let (base_url, api_key, api_secret, recv_window_ms, timeout_secs) = with_config(|cfg| {
            (
                cfg.exchange.base_url.clone(),
                cfg.exchange.api_key.clone(),
                cfg.exchange.api_secret.clone(),
                cfg.exchange.recv_window_ms,
                cfg.exchange.request_timeout_secs,
            )
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            api_key,
            api_secret,
            recv_window_ms,
            timeout_ms: timeout_secs * 1000,
        }
    }

    /// Build the signed query string: params + recvWindow + timestamp + signature
    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms,
            Utc::now().timestamp_millis()
        ));

        let signature = sign_query(&self.api_secret, &query);
        format!("{}&signature={}", query, signature)
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        query: &str,
        signed: bool,
    ) -> Result<Value, SwarmBotError> {
        let url = if query.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, query)
        };

        if is_debug_exchange_enabled() {
            logger::debug(LogTag::Exchange, &format!("-> {}", url));
        }

        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        };

        if signed {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                SwarmBotError::Timeout {
                    endpoint: path.to_string(),
                    timeout_ms: self.timeout_ms,
                }
            } else {
                SwarmBotError::transient(format!("{}: {}", path, e))
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SwarmBotError::transient(format!("{}: body read failed: {}", path, e)))?;

        if !(200..300).contains(&status) {
            return Err(SwarmBotError::Exchange { status, body });
        }

        serde_json::from_str(&body).map_err(|e| SwarmBotError::MalformedResponse {
            endpoint: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Send with a single retry for transient failures
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &str,
        signed: bool,
    ) -> Result<Value, SwarmBotError> {
        match self.send_once(&method, path, query, signed).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => {
                logger::warning(
                    LogTag::Exchange,
                    &format!("Transient error on {}, retrying once: {}", path, e),
                );
                self.send_once(&method, path, query, signed).await
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse a JSON string-or-number field into f64
fn parse_f64(value: &Value, key: &str, endpoint: &str) -> Result<f64, SwarmBotError> {
    let field = &value[key];
    let parsed = match field {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| SwarmBotError::MalformedResponse {
        endpoint: endpoint.to_string(),
        message: format!("missing or invalid field '{}'", key),
    })
}

fn parse_side(value: &Value, endpoint: &str) -> Result<OrderSide, SwarmBotError> {
    match value["side"].as_str() {
        Some("BUY") => Ok(OrderSide::Buy),
        Some("SELL") => Ok(OrderSide::Sell),
        _ => Err(SwarmBotError::MalformedResponse {
            endpoint: endpoint.to_string(),
            message: "missing or invalid side".to_string(),
        }),
    }
}

#[async_trait]
impl ExchangeApi for RestExchange {
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker, SwarmBotError> {
        let path = "/api/v3/ticker/bookTicker";
        let value = self
            .send(Method::Get, path, &format!("symbol={}", symbol), false)
            .await?;

        Ok(BookTicker {
            symbol: symbol.to_string(),
            bid_price: parse_f64(&value, "bidPrice", path)?,
            bid_qty: parse_f64(&value, "bidQty", path)?,
            ask_price: parse_f64(&value, "askPrice", path)?,
            ask_qty: parse_f64(&value, "askQty", path)?,
        })
    }

    async fn recent_closes(&self, symbol: &str, limit: usize) -> Result<Vec<f64>, SwarmBotError> {
        let path = "/api/v3/klines";
        let value = self
            .send(
                Method::Get,
                path,
                &format!("symbol={}&interval=1m&limit={}", symbol, limit),
                false,
            )
            .await?;

        let rows = value.as_array().ok_or_else(|| SwarmBotError::MalformedResponse {
            endpoint: path.to_string(),
            message: "expected kline array".to_string(),
        })?;

        // Close price is the 5th field of each kline row
        let mut closes = Vec::with_capacity(rows.len());
        for row in rows {
            let close = row
                .get(4)
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| SwarmBotError::MalformedResponse {
                    endpoint: path.to_string(),
                    message: "kline row missing close price".to_string(),
                })?;
            closes.push(close);
        }

        Ok(closes)
    }

    async fn account(&self) -> Result<AccountSnapshot, SwarmBotError> {
        let path = "/api/v3/account";
        let query = self.signed_query(&[]);
        let value = self.send(Method::Get, path, &query, true).await?;

        let rows = value["balances"]
            .as_array()
            .ok_or_else(|| SwarmBotError::MalformedResponse {
                endpoint: path.to_string(),
                message: "missing balances".to_string(),
            })?;

        let mut balances = Vec::with_capacity(rows.len());
        for row in rows {
            let asset = row["asset"].as_str().unwrap_or_default().to_string();
            if asset.is_empty() {
                continue;
            }
            balances.push(AssetBalance {
                asset,
                free: parse_f64(row, "free", path)?,
                locked: parse_f64(row, "locked", path)?,
            });
        }

        Ok(AccountSnapshot { balances })
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<OpenOrder>, SwarmBotError> {
        let path = "/api/v3/openOrders";
        let query = self.signed_query(&[("symbol", symbol.to_string())]);
        let value = self.send(Method::Get, path, &query, true).await?;

        let rows = value.as_array().ok_or_else(|| SwarmBotError::MalformedResponse {
            endpoint: path.to_string(),
            message: "expected order array".to_string(),
        })?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(OpenOrder {
                order_id: row["orderId"].to_string(),
                symbol: symbol.to_string(),
                side: parse_side(row, path)?,
                price: parse_f64(row, "price", path)?,
                orig_qty: parse_f64(row, "origQty", path)?,
                executed_qty: parse_f64(row, "executedQty", path)?,
            });
        }

        Ok(orders)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder, SwarmBotError> {
        let path = "/api/v3/order";
        let query = self.signed_query(&[
            ("symbol", request.symbol.clone()),
            ("side", request.side.as_str().to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", format!("{:.8}", request.quantity)),
            ("price", format!("{:.8}", request.price)),
        ]);
        let value = self.send(Method::Post, path, &query, true).await?;

        Ok(PlacedOrder {
            order_id: value["orderId"].to_string(),
            symbol: request.symbol.clone(),
            side: request.side,
            price: request.price,
            quantity: request.quantity,
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<(), SwarmBotError> {
        let path = "/api/v3/order";
        let query = self.signed_query(&[
            ("symbol", symbol.to_string()),
            ("orderId", order_id.to_string()),
        ]);
        self.send(Method::Delete, path, &query, true).await?;
        Ok(())
    }

    async fn cancel_all_orders(&self, symbol: &str) -> Result<usize, SwarmBotError> {
        let path = "/api/v3/openOrders";
        let query = self.signed_query(&[("symbol", symbol.to_string())]);

        match self.send(Method::Delete, path, &query, true).await {
            Ok(value) => Ok(value.as_array().map(|a| a.len()).unwrap_or(0)),
            // The exchange rejects cancel-all when nothing is open; that
            // counts as zero cancellations, not a failure.
            Err(SwarmBotError::Exchange { status: 400, body }) if body.contains("-2011") => Ok(0),
            Err(e) => Err(e),
        }
    }
}
