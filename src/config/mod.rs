//! Typed configuration with a single global instance
//!
//! One `Config` struct is the only configuration type in the process;
//! every call site reads it through `with_config` and mutates it
//! through `update_config_section`. The file on disk is JSON with
//! every field optional (defaults fill the gaps).
//!
//! Validation happens once at engine start: a malformed config is
//! fatal to `start()` and nothing else.

mod macros;
mod schemas;

pub use schemas::*;

use crate::logger::{self, LogTag};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

static CONFIG: Lazy<RwLock<Config>> = Lazy::new(|| RwLock::new(Config::default()));

/// Read from the global config without cloning it
pub fn with_config<F, R>(f: F) -> R
where
    F: FnOnce(&Config) -> R,
{
    let guard = CONFIG.read().expect("config lock poisoned");
    f(&guard)
}

/// Clone the whole config (prefer `with_config` for simple reads)
pub fn get_config() -> Config {
    with_config(|cfg| cfg.clone())
}

/// Mutate a section of the global config, optionally persisting to disk
pub fn update_config_section<F>(f: F, persist: bool) -> Result<(), String>
where
    F: FnOnce(&mut Config),
{
    {
        let mut guard = CONFIG.write().map_err(|_| "config lock poisoned")?;
        f(&mut guard);
    }

    if persist {
        save_config_file()?;
    }

    Ok(())
}

/// Load the config file into the global instance
///
/// A missing file is not an error: defaults apply and a template file
/// is written so the operator has something to edit.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<(), String> {
    let path = path.as_ref();

    if !path.exists() {
        logger::warning(
            LogTag::Config,
            &format!("Config file {} not found - writing defaults", path.display()),
        );
        let default = Config::default();
        let json = serde_json::to_string_pretty(&default)
            .map_err(|e| format!("Failed to serialize default config: {}", e))?;
        fs::write(path, json).map_err(|e| format!("Failed to write default config: {}", e))?;
        return Ok(());
    }

    let data =
        fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;
    let config: Config =
        serde_json::from_str(&data).map_err(|e| format!("Invalid config JSON: {}", e))?;

    let mut guard = CONFIG.write().map_err(|_| "config lock poisoned")?;
    *guard = config;

    Ok(())
}

/// Persist the current config to its file
pub fn save_config_file() -> Result<(), String> {
    let path = crate::paths::config_file_path();
    let json = with_config(|cfg| serde_json::to_string_pretty(cfg))
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(&path, json).map_err(|e| format!("Failed to write config file: {}", e))
}

/// Validate config before a session starts
///
/// Only called from `start()`; a failure here is fatal to that start
/// attempt and nothing else (the process keeps running).
pub fn validate_config(cfg: &Config) -> Result<(), String> {
    if cfg.engine.symbols.is_empty() {
        return Err("engine.symbols must not be empty".to_string());
    }
    for symbol in &cfg.engine.symbols {
        if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid symbol '{}'", symbol));
        }
    }
    if cfg.engine.cycle_interval_secs == 0 {
        return Err("engine.cycle_interval_secs must be positive".to_string());
    }
    if cfg.exchange.request_timeout_secs >= cfg.engine.cycle_interval_secs {
        return Err(
            "exchange.request_timeout_secs must be shorter than the cycle interval".to_string(),
        );
    }
    if cfg.engine.capital_per_symbol <= 0.0 {
        return Err("engine.capital_per_symbol must be positive".to_string());
    }
    if cfg.engine.order_levels == 0 {
        return Err("engine.order_levels must be at least 1".to_string());
    }
    if cfg.engine.base_spread_pct <= 0.0 {
        return Err("engine.base_spread_pct must be positive".to_string());
    }
    if !(cfg.swarm.consensus_threshold > 0.0 && cfg.swarm.consensus_threshold <= 1.0) {
        return Err("swarm.consensus_threshold must be in (0, 1]".to_string());
    }
    let weights = [
        cfg.swarm.technical_weight,
        cfg.swarm.sentiment_weight,
        cfg.swarm.optimizer_weight,
        cfg.swarm.timing_weight,
    ];
    if weights.iter().any(|w| *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
        return Err("swarm source weights must be non-negative with a positive sum".to_string());
    }
    if cfg.risk.max_drawdown_pct <= 0.0 {
        return Err("risk.max_drawdown_pct must be positive".to_string());
    }
    if cfg.risk.max_position_size <= 0.0 {
        return Err("risk.max_position_size must be positive".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn rejects_empty_symbols() {
        let mut cfg = Config::default();
        cfg.engine.symbols.clear();
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_timeout_longer_than_interval() {
        let mut cfg = Config::default();
        cfg.exchange.request_timeout_secs = 60;
        cfg.engine.cycle_interval_secs = 30;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn rejects_malformed_symbol() {
        let mut cfg = Config::default();
        cfg.engine.symbols = vec!["BTC/USDT".to_string()];
        assert!(validate_config(&cfg).is_err());
    }
}
