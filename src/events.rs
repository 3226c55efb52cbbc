//! In-memory event journal
//!
//! Bounded ring of notable engine happenings (session starts, risk
//! halts, partial placements, training rounds) served raw through the
//! control API. Strictly informational; nothing in the trading path
//! reads it back.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Journal capacity; oldest entries are dropped first
const MAX_EVENTS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub subtype: String,
    pub severity: Severity,
    pub symbol: Option<String>,
    pub payload: Value,
}

static EVENTS: Lazy<RwLock<VecDeque<Event>>> =
    Lazy::new(|| RwLock::new(VecDeque::with_capacity(MAX_EVENTS)));

fn record(category: &str, subtype: &str, severity: Severity, symbol: Option<&str>, payload: Value) {
    let event = Event {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        category: category.to_string(),
        subtype: subtype.to_string(),
        severity,
        symbol: symbol.map(|s| s.to_string()),
        payload,
    };

    let mut events = EVENTS.write();
    while events.len() >= MAX_EVENTS {
        events.pop_front();
    }
    events.push_back(event);
}

pub fn record_engine_event(subtype: &str, severity: Severity, symbol: Option<&str>, payload: Value) {
    record("engine", subtype, severity, symbol, payload);
}

pub fn record_order_event(subtype: &str, severity: Severity, symbol: &str, payload: Value) {
    record("orders", subtype, severity, Some(symbol), payload);
}

pub fn record_learner_event(subtype: &str, severity: Severity, payload: Value) {
    record("learner", subtype, severity, None, payload);
}

/// Most recent events, newest first
pub fn recent_events(limit: usize) -> Vec<Event> {
    let events = EVENTS.read();
    events.iter().rev().take(limit).cloned().collect()
}

#[cfg(test)]
pub fn clear_events() {
    EVENTS.write().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn journal_is_bounded_and_newest_first() {
        clear_events();
        for i in 0..(MAX_EVENTS + 10) {
            record_engine_event("cycle", Severity::Info, Some("BTCUSDT"), json!({ "i": i }));
        }

        let recent = recent_events(MAX_EVENTS + 100);
        assert_eq!(recent.len(), MAX_EVENTS);
        assert_eq!(recent[0].payload["i"], json!(MAX_EVENTS + 9));
    }

    #[test]
    fn limit_is_honored() {
        clear_events();
        for _ in 0..10 {
            record_order_event("placed", Severity::Info, "BTCUSDT", json!({}));
        }
        assert_eq!(recent_events(3).len(), 3);
    }
}
