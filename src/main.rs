//! Process entrypoint: wire up directories, logging, config and the
//! engine, then run until a shutdown signal arrives.

use swarmbot::config;
use swarmbot::engine::{self, EngineCommand};
use swarmbot::logger::{self, LogTag};
use swarmbot::{arguments, paths};

#[tokio::main]
async fn main() {
    arguments::set_cmd_args(std::env::args().skip(1).collect());

    if arguments::is_help_requested() {
        arguments::print_help();
        return;
    }

    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create data directories: {}", e);
        std::process::exit(1);
    }

    logger::init();
    logger::info(LogTag::System, "swarmbot starting");

    if let Err(e) = config::load_config_file(paths::config_file_path()) {
        logger::error(LogTag::Config, &format!("Config load failed: {}", e));
        std::process::exit(1);
    }
    if let Err(e) = config::with_config(config::validate_config) {
        logger::error(LogTag::Config, &format!("Config invalid: {}", e));
        std::process::exit(1);
    }

    let handle = engine::init();

    #[cfg(feature = "web")]
    if let Err(e) = swarmbot::webserver::start_webserver().await {
        logger::error(LogTag::Webserver, &format!("Webserver failed: {}", e));
        std::process::exit(1);
    }

    // Ctrl+C requests a graceful stop: finish the cycle in flight,
    // cancel resting orders, flush the experience snapshot
    let (shutdown_tx, shutdown_rx) = std::sync::mpsc::channel::<()>();
    {
        let handle = handle.clone();
        ctrlc::set_handler(move || {
            logger::info(LogTag::System, "Shutdown signal received");
            let _ = handle.send(EngineCommand::Stop);
            let _ = shutdown_tx.send(());
        })
        .unwrap_or_else(|e| {
            logger::error(LogTag::System, &format!("Signal handler failed: {}", e));
        });
    }

    let enabled = config::with_config(|cfg| cfg.engine.enabled);
    if enabled {
        if let Err(e) = handle.send(EngineCommand::Start) {
            logger::error(LogTag::Engine, &format!("Engine start failed: {}", e));
            std::process::exit(1);
        }
    } else {
        logger::info(
            LogTag::Engine,
            "Engine disabled in config; start it via the API",
        );
    }

    // Park the main thread until the signal handler fires, then give
    // the engine a moment to wind down
    let _ = tokio::task::spawn_blocking(move || shutdown_rx.recv()).await;

    for _ in 0..100 {
        if !handle.control().is_running() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }

    logger::info(LogTag::System, "swarmbot stopped");
    logger::flush();
}
