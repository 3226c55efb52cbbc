//! Structured error types for the trading core
//!
//! Errors are classified by how the cycle reacts to them, not by where
//! they originate:
//! - `Transient` - network / timeout / rate limit; retried at most once,
//!   then the component's output is treated as absent for the cycle
//! - `Validation` - bad symbol or config; fatal to `start()` only
//! - `Exchange` - non-2xx or malformed response from the exchange
//! - `PartialExecution` - some ladder levels failed; recorded, corrected
//!   next cycle by cancel-then-replace
//! - `Critical` - emergency conditions; halts placement and cancels
//!   everything
//!
//! Nothing in the cycle is allowed to propagate out of the scheduler;
//! every component boundary converts into one of these kinds.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SwarmBotError {
    #[error("transient error: {message}")]
    Transient { message: String },

    #[error("request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("exchange error (HTTP {status}): {body}")]
    Exchange { status: u16, body: String },

    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("partial execution: {placed}/{attempted} ladder levels placed")]
    PartialExecution { placed: usize, attempted: usize },

    #[error("critical: {message}")]
    Critical { message: String },
}

impl SwarmBotError {
    pub fn transient(message: impl Into<String>) -> Self {
        SwarmBotError::Transient {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SwarmBotError::Validation {
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        SwarmBotError::Critical {
            message: message.into(),
        }
    }

    /// Transient errors are the only kind worth a single retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwarmBotError::Transient { .. }
                | SwarmBotError::Timeout { .. }
                | SwarmBotError::Exchange { status: 429, .. }
                | SwarmBotError::Exchange { status: 500..=599, .. }
        )
    }
}

impl From<reqwest::Error> for SwarmBotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SwarmBotError::Timeout {
                endpoint: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                timeout_ms: 0,
            }
        } else {
            SwarmBotError::Transient {
                message: format!("HTTP request failed: {}", err),
            }
        }
    }
}

impl From<serde_json::Error> for SwarmBotError {
    fn from(err: serde_json::Error) -> Self {
        SwarmBotError::MalformedResponse {
            endpoint: "unknown".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(SwarmBotError::transient("connection reset").is_transient());
        assert!(SwarmBotError::Exchange {
            status: 429,
            body: "rate limited".to_string()
        }
        .is_transient());
        assert!(SwarmBotError::Exchange {
            status: 503,
            body: "maintenance".to_string()
        }
        .is_transient());
        assert!(!SwarmBotError::Exchange {
            status: 400,
            body: "bad lot size".to_string()
        }
        .is_transient());
        assert!(!SwarmBotError::validation("bad symbol").is_transient());
    }
}
