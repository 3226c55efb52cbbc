/// Centralized command-line argument handling
///
/// Consolidates argument parsing and flag checking so every module
/// reads flags the same way:
/// - Thread-safe CMD_ARGS storage (overridable for tests)
/// - Flag presence / value helpers
/// - Named helpers for the flags the bot understands
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Override the stored arguments (used by tests)
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Get a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Check if a specific argument is present
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Get the value following a flag, if any
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

// =============================================================================
// NAMED FLAG HELPERS
// =============================================================================

/// --help / -h
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// --paper: force paper-trading mode even when credentials exist
pub fn is_paper_mode_forced() -> bool {
    has_arg("--paper")
}

/// --no-web: disable the web control surface
pub fn is_web_disabled() -> bool {
    has_arg("--no-web")
}

/// --config <path>: alternate config file location
pub fn config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Engine module debug mode
pub fn is_debug_engine_enabled() -> bool {
    has_arg("--debug-engine") || has_arg("--debug-all")
}

/// Exchange client debug mode
pub fn is_debug_exchange_enabled() -> bool {
    has_arg("--debug-exchange") || has_arg("--debug-all")
}

/// Webserver debug mode
pub fn is_debug_webserver_enabled() -> bool {
    has_arg("--debug-webserver") || has_arg("--debug-all")
}

/// Print help text for the binary
pub fn print_help() {
    println!("swarmbot - consensus-driven autonomous trading loop");
    println!();
    println!("USAGE:");
    println!("  swarmbot [FLAGS]");
    println!();
    println!("FLAGS:");
    println!("  --config <path>     Use an alternate config file");
    println!("  --paper             Force paper-trading mode");
    println!("  --no-web            Disable the web control surface");
    println!("  --debug-<module>    Enable debug logs for one module");
    println!("                      (engine, market, swarm, consensus, risk,");
    println!("                       orders, exchange, portfolio, learner,");
    println!("                       sentiment, webserver)");
    println!("  --debug-all         Enable debug logs for every module");
    println!("  --verbose           Enable verbose tracing");
    println!("  --quiet             Errors only");
    println!("  --help, -h          Show this help");
}
