//! Trading engine: command loop and per-symbol cycle tasks
//!
//! One supervisor task owns the session lifecycle and reacts to typed
//! commands from the control surface; each configured symbol gets its
//! own task running the decision cycle on the configured interval.
//! A cycle that overruns the interval restarts after a short minimum
//! wait instead of drifting.

pub mod cycle;
pub mod session;

use crate::config::with_config;
use crate::events::{self, Severity};
use crate::exchange::build_exchange;
use crate::learning::{new_shared_model, Learner, SharedModel};
use crate::logger::{self, LogTag};
use crate::orders::OrderLifecycle;
use crate::portfolio::{PnLTracker, PortfolioState};
use crate::risk::RiskGate;
use crate::swarm::{SourceWeights, Swarm};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use self::cycle::{run_cycle, CycleContext};
use self::session::SessionControl;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineCommand {
    Start,
    Stop,
    EmergencyStop,
    ConfigUpdate,
}

/// Handle shared with the control surface and signal handlers
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineCommand>,
    control: Arc<SessionControl>,
    portfolios: Arc<RwLock<HashMap<String, PortfolioState>>>,
}

impl EngineHandle {
    pub fn send(&self, command: EngineCommand) -> Result<(), String> {
        self.tx
            .send(command)
            .map_err(|_| "engine supervisor is gone".to_string())
    }

    pub fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Latest per-symbol portfolio snapshots
    pub fn portfolios(&self) -> HashMap<String, PortfolioState> {
        self.portfolios.read().clone()
    }
}

static ENGINE: OnceCell<EngineHandle> = OnceCell::new();

/// Spawn the supervisor and register the global handle
pub fn init() -> EngineHandle {
    ENGINE
        .get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            let control = Arc::new(SessionControl::new());
            let portfolios = Arc::new(RwLock::new(HashMap::new()));

            let handle = EngineHandle {
                tx: tx.clone(),
                control: control.clone(),
                portfolios: portfolios.clone(),
            };

            tokio::spawn(supervisor(rx, tx, control, portfolios));
            handle
        })
        .clone()
}

pub fn handle() -> Option<EngineHandle> {
    ENGINE.get().cloned()
}

async fn supervisor(
    mut rx: mpsc::UnboundedReceiver<EngineCommand>,
    tx: mpsc::UnboundedSender<EngineCommand>,
    control: Arc<SessionControl>,
    portfolios: Arc<RwLock<HashMap<String, PortfolioState>>>,
) {
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();
    let mut learner: Option<Arc<Mutex<Learner>>> = None;

    while let Some(command) = rx.recv().await {
        match command {
            EngineCommand::Start => {
                if control.is_running() {
                    logger::warning(LogTag::Engine, "Start ignored: session already running");
                    continue;
                }

                let symbols = with_config(|cfg| cfg.engine.symbols.clone());
                control.mark_started();
                portfolios.write().clear();

                let exchange = build_exchange();
                let model: SharedModel = new_shared_model();
                let weights = SourceWeights::from_config();
                let session_learner =
                    Arc::new(Mutex::new(Learner::from_config(model.clone(), weights.clone())));
                learner = Some(session_learner.clone());

                for symbol in &symbols {
                    tasks.push(tokio::spawn(run_symbol(
                        symbol.clone(),
                        exchange.clone(),
                        model.clone(),
                        weights.clone(),
                        session_learner.clone(),
                        control.clone(),
                        portfolios.clone(),
                        tx.clone(),
                    )));
                }

                logger::info(
                    LogTag::Engine,
                    &format!("Session started for {} symbol(s)", symbols.len()),
                );
                events::record_engine_event(
                    "session_started",
                    Severity::Info,
                    None,
                    json!({ "symbols": symbols }),
                );
            }

            EngineCommand::Stop | EngineCommand::EmergencyStop => {
                if !control.is_running() {
                    logger::debug(LogTag::Engine, "Stop ignored: no session running");
                    continue;
                }

                let emergency = command == EngineCommand::EmergencyStop
                    || control.emergency_triggered();
                if emergency {
                    control.request_emergency();
                } else {
                    control.request_stop();
                }

                for task in tasks.drain(..) {
                    let _ = task.await;
                }
                if let Some(learner) = learner.take() {
                    learner.lock().shutdown();
                }
                control.mark_stopped();

                let (subtype, severity) = if emergency {
                    ("session_emergency_stopped", Severity::Critical)
                } else {
                    ("session_stopped", Severity::Info)
                };
                logger::info(LogTag::Engine, &format!("Session ended ({})", subtype));
                events::record_engine_event(subtype, severity, None, json!({}));
            }

            EngineCommand::ConfigUpdate => {
                // Session-scoped parameters are captured at Start; a
                // live update takes effect on the next session
                logger::info(
                    LogTag::Engine,
                    "Config updated; session-scoped values apply on next start",
                );
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_symbol(
    symbol: String,
    exchange: Arc<dyn crate::exchange::ExchangeApi>,
    model: SharedModel,
    weights: SourceWeights,
    learner: Arc<Mutex<Learner>>,
    control: Arc<SessionControl>,
    portfolios: Arc<RwLock<HashMap<String, PortfolioState>>>,
    tx: mpsc::UnboundedSender<EngineCommand>,
) {
    let (interval_secs, min_wait_ms, capital, threshold) = with_config(|cfg| {
        (
            cfg.engine.cycle_interval_secs,
            cfg.engine.cycle_min_wait_ms,
            cfg.engine.capital_per_symbol,
            cfg.swarm.consensus_threshold,
        )
    });
    let interval = Duration::from_secs(interval_secs);
    let min_wait = Duration::from_millis(min_wait_ms);

    let mut ctx = CycleContext::new(
        symbol.clone(),
        exchange.clone(),
        Swarm::from_config(model, weights),
        RiskGate::from_config(),
        OrderLifecycle::from_config(),
        PnLTracker::new(&symbol, capital),
        learner,
        control.clone(),
        threshold,
    );

    let mut wake = control.wake_receiver();
    let mut cycle_number: u64 = 0;

    logger::info(LogTag::Engine, &format!("{}: cycle task started", symbol));

    loop {
        if control.should_stop() {
            break;
        }

        let started = Instant::now();
        cycle_number += 1;
        control.next_iteration();

        match run_cycle(&mut ctx, cycle_number).await {
            Ok(outcome) if outcome.emergency => {
                logger::warning(
                    LogTag::Engine,
                    &format!("{}: emergency halt on cycle {}", symbol, cycle_number),
                );
                control.request_emergency();
                let _ = tx.send(EngineCommand::Stop);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                // No-op cycle: nothing placed, nothing recorded
                logger::warning(
                    LogTag::Engine,
                    &format!("{}: cycle {} skipped: {}", symbol, cycle_number, e),
                );
                ctx.tracker.record_skipped_cycle();
            }
        }

        portfolios
            .write()
            .insert(symbol.clone(), ctx.tracker.snapshot());

        // Emergency raised elsewhere while this cycle was in flight
        if control.should_stop() {
            break;
        }

        let elapsed = started.elapsed();
        let wait = if elapsed >= interval {
            logger::debug(
                LogTag::Engine,
                &format!(
                    "{}: cycle {} overran interval ({:?}), restarting after minimum wait",
                    symbol, cycle_number, elapsed
                ),
            );
            min_wait
        } else {
            interval - elapsed
        };

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wake.changed() => {}
        }
    }

    // Leave no resting quotes behind, whatever the reason for exit
    if let Err(e) = exchange.cancel_all_orders(&symbol).await {
        logger::warning(
            LogTag::Engine,
            &format!("{}: teardown cancel failed: {}", symbol, e),
        );
    }

    portfolios.write().insert(symbol.clone(), ctx.tracker.snapshot());
    logger::info(LogTag::Engine, &format!("{}: cycle task finished", symbol));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn start_cycle_and_stop_against_paper_exchange() {
        let engine = init();

        engine.send(EngineCommand::Start).unwrap();

        // Let the first cycle complete against the paper exchange
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if engine.control().iterations() > 0 && !engine.portfolios().is_empty() {
                break;
            }
        }
        assert!(engine.control().is_running());
        assert!(engine.control().iterations() > 0);
        assert!(engine.portfolios().contains_key("BTCUSDT"));

        engine.send(EngineCommand::Stop).unwrap();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if !engine.control().is_running() {
                break;
            }
        }
        assert!(!engine.control().is_running());

        // Stop is idempotent when nothing is running
        engine.send(EngineCommand::Stop).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!engine.control().is_running());
    }
}
