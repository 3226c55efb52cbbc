/// Logger configuration derived from command-line arguments
///
/// Scans process arguments once at init for:
/// - --debug-<module>: enable debug output for one tag
/// - --debug-all: enable debug output for every tag
/// - --verbose: enable verbose output globally
/// - --quiet: suppress warnings and info

use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_all: bool,
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_all: false,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().map(|c| c.clone()).unwrap_or_default()
}

/// Initialize logger configuration from process arguments
pub fn init_from_args() {
    let args = arguments::get_cmd_args();

    let mut config = LoggerConfig::default();

    for arg in &args {
        if arg == "--verbose" {
            config.min_level = LogLevel::Verbose;
        } else if arg == "--quiet" {
            config.min_level = LogLevel::Error;
        } else if arg == "--debug-all" {
            config.debug_all = true;
        } else if let Some(module) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(module.to_string());
        }
    }

    if let Ok(mut guard) = LOGGER_CONFIG.write() {
        *guard = config;
    }
}

/// Check if debug output is enabled for a specific tag
pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = get_logger_config();
    config.debug_all || config.debug_tags.contains(&tag.to_debug_key())
}
