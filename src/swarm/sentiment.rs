//! Sentiment opinion source backed by an LLM completion API
//!
//! Sends a compact market summary and expects a `ACTION CONFIDENCE`
//! reply (e.g. `BUY 0.7`). Any failure along the way - missing key,
//! timeout, unparseable reply - degrades to an abstention so the
//! swarm keeps cycling without the external service.

use super::types::{Opinion, TradeAction};
use super::{OpinionSource, SOURCE_SENTIMENT};
use crate::apis::llm::LlmClient;
use crate::logger::{self, LogTag};
use crate::market::MarketSnapshot;
use crate::portfolio::PortfolioState;
use async_trait::async_trait;

pub struct SentimentSource {
    client: LlmClient,
}

impl SentimentSource {
    pub fn from_config() -> Self {
        Self {
            client: LlmClient::from_config(),
        }
    }

    fn build_prompt(snapshot: &MarketSnapshot, portfolio: &PortfolioState) -> String {
        let window_change = match (snapshot.closes.first(), snapshot.closes.last()) {
            (Some(first), Some(last)) if *first > 0.0 => (last / first - 1.0) * 100.0,
            _ => 0.0,
        };

        format!(
            "You are a crypto market-making advisor. Symbol {symbol}: price {price:.4}, \
             change over window {change:+.3}%, spread {spread:.4}%, volatility {vol:.5}. \
             Current exposure {exposure:.2} quote units, session PnL {pnl:+.2}. \
             Answer with exactly one line: BUY, SELL or HOLD followed by a confidence \
             between 0 and 1. Example: HOLD 0.6",
            symbol = snapshot.symbol,
            price = snapshot.price,
            change = window_change,
            spread = snapshot.spread * 100.0,
            vol = snapshot.volatility,
            exposure = portfolio.exposure,
            pnl = portfolio.realized_pnl,
        )
    }
}

/// Parse an `ACTION CONFIDENCE` reply, tolerating extra prose
pub fn parse_reply(reply: &str) -> Option<(TradeAction, f64)> {
    let mut action = None;
    let mut confidence = None;

    for token in reply.split_whitespace() {
        let cleaned = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '.');
        if action.is_none() {
            action = match cleaned.to_ascii_uppercase().as_str() {
                "BUY" => Some(TradeAction::Buy),
                "SELL" => Some(TradeAction::Sell),
                "HOLD" => Some(TradeAction::Hold),
                _ => None,
            };
            continue;
        }
        if confidence.is_none() {
            if let Ok(value) = cleaned.parse::<f64>() {
                if (0.0..=1.0).contains(&value) {
                    confidence = Some(value);
                    break;
                }
            }
        }
    }

    action.map(|a| (a, confidence.unwrap_or(0.5)))
}

#[async_trait]
impl OpinionSource for SentimentSource {
    fn name(&self) -> &'static str {
        SOURCE_SENTIMENT
    }

    async fn evaluate(&self, snapshot: &MarketSnapshot, portfolio: &PortfolioState) -> Opinion {
        if !self.client.has_credentials() {
            return Opinion::abstain(SOURCE_SENTIMENT);
        }

        let prompt = Self::build_prompt(snapshot, portfolio);
        let reply = match self.client.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                logger::warning(
                    LogTag::Sentiment,
                    &format!("{}: LLM call failed, abstaining: {}", snapshot.symbol, e),
                );
                return Opinion::abstain(SOURCE_SENTIMENT);
            }
        };

        match parse_reply(&reply) {
            Some((action, confidence)) => Opinion::new(SOURCE_SENTIMENT, action, confidence),
            None => {
                logger::warning(
                    LogTag::Sentiment,
                    &format!("{}: unparseable LLM reply: {:?}", snapshot.symbol, reply),
                );
                Opinion::abstain(SOURCE_SENTIMENT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_replies() {
        assert_eq!(parse_reply("BUY 0.7"), Some((TradeAction::Buy, 0.7)));
        assert_eq!(parse_reply("sell 0.25"), Some((TradeAction::Sell, 0.25)));
        assert_eq!(parse_reply("HOLD 1"), Some((TradeAction::Hold, 1.0)));
    }

    #[test]
    fn parses_replies_with_prose() {
        assert_eq!(
            parse_reply("I would say: BUY, 0.8 given the trend."),
            Some((TradeAction::Buy, 0.8))
        );
    }

    #[test]
    fn missing_confidence_defaults_to_half() {
        assert_eq!(parse_reply("HOLD"), Some((TradeAction::Hold, 0.5)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_reply("to the moon"), None);
        assert_eq!(parse_reply(""), None);
    }
}
