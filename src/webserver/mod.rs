//! HTTP control surface
//!
//! Small JSON API over axum for driving and observing the engine:
//! session start/stop/emergency-stop, status, aggregated performance,
//! config read/update and the event journal. Binds localhost by
//! default; disable entirely with --no-web or the config flag.

use crate::config::{self, with_config, Config};
use crate::engine::{self, EngineCommand};
use crate::events;
use crate::logger::{self, LogTag};
use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

pub async fn start_webserver() -> Result<(), String> {
    let (enabled, bind_address, port) = with_config(|cfg| {
        (
            cfg.webserver.enabled,
            cfg.webserver.bind_address.clone(),
            cfg.webserver.port,
        )
    });

    if !enabled || crate::arguments::is_web_disabled() {
        logger::info(LogTag::Webserver, "Webserver disabled");
        return Ok(());
    }

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/api/performance", get(performance))
        .route("/api/engine/start", post(engine_start))
        .route("/api/engine/stop", post(engine_stop))
        .route("/api/engine/emergency-stop", post(engine_emergency_stop))
        .route("/api/config", get(get_config_redacted).post(update_config))
        .route("/api/events", get(list_events))
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", bind_address, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| format!("webserver bind {} failed: {}", addr, e))?;

    logger::info(LogTag::Webserver, &format!("Listening on http://{}", addr));

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            logger::error(LogTag::Webserver, &format!("Webserver exited: {}", e));
        }
    });

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status() -> Json<Value> {
    let (running, iterations, uptime, emergency) = match engine::handle() {
        Some(handle) => (
            handle.control().is_running(),
            handle.control().iterations(),
            handle.control().uptime_secs(),
            handle.control().emergency_triggered(),
        ),
        None => (false, 0, 0, false),
    };

    let symbols = with_config(|cfg| cfg.engine.symbols.clone());

    Json(json!({
        "running": running,
        "iteration_count": iterations,
        "uptime_secs": uptime,
        "emergency_stopped": emergency,
        "symbols": symbols,
    }))
}

async fn performance() -> Json<Value> {
    let portfolios = engine::handle()
        .map(|h| h.portfolios())
        .unwrap_or_default();

    let mut balance = 0.0;
    let mut pnl = 0.0;
    let mut trades = 0u32;
    let mut wins = 0u32;
    let mut losses = 0u32;
    let mut worst_drawdown: f64 = 0.0;
    let mut cycles = 0u64;
    let mut reached = 0u64;

    let per_symbol: Vec<Value> = portfolios
        .values()
        .map(|p| {
            balance += p.equity;
            pnl += p.realized_pnl;
            trades += p.trade_count;
            wins += p.wins;
            losses += p.losses;
            worst_drawdown = worst_drawdown.max(p.drawdown_pct());
            cycles += p.cycles;
            reached += p.consensus_reached;

            json!({
                "symbol": p.symbol,
                "equity": p.equity,
                "exposure": p.exposure,
                "realizedPnl": p.realized_pnl,
                "drawdown": p.drawdown_pct(),
                "trades": p.trade_count,
                "winRate": p.win_rate(),
                "consensusRate": p.consensus_rate(),
            })
        })
        .collect();

    let decided = wins + losses;
    let win_rate = if decided > 0 {
        wins as f64 / decided as f64
    } else {
        0.0
    };
    let consensus_rate = if cycles > 0 {
        reached as f64 / cycles as f64
    } else {
        0.0
    };

    Json(json!({
        "balance": balance,
        "realizedPnl": pnl,
        "trades": trades,
        "winRate": win_rate,
        "drawdown": worst_drawdown,
        "consensusRate": consensus_rate,
        "symbols": per_symbol,
    }))
}

fn send_command(command: EngineCommand) -> (StatusCode, Json<Value>) {
    match engine::handle() {
        Some(handle) => match handle.send(command) {
            Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "accepted": true }))),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e })),
            ),
        },
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "engine not initialized" })),
        ),
    }
}

async fn engine_start() -> (StatusCode, Json<Value>) {
    send_command(EngineCommand::Start)
}

async fn engine_stop() -> (StatusCode, Json<Value>) {
    send_command(EngineCommand::Stop)
}

async fn engine_emergency_stop() -> (StatusCode, Json<Value>) {
    send_command(EngineCommand::EmergencyStop)
}

async fn get_config_redacted() -> Json<Value> {
    let mut cfg = config::get_config();
    if !cfg.exchange.api_secret.is_empty() {
        cfg.exchange.api_secret = "***".to_string();
    }
    if !cfg.exchange.api_key.is_empty() {
        cfg.exchange.api_key = "***".to_string();
    }
    if !cfg.sentiment.api_key.is_empty() {
        cfg.sentiment.api_key = "***".to_string();
    }
    Json(serde_json::to_value(&cfg).unwrap_or_else(|_| json!({})))
}

/// Marker the redacted config read substitutes for secrets; a write
/// carrying it back verbatim must never overwrite the real values
const REDACTED: &str = "***";

/// Replace the configuration; session-defining fields (symbols,
/// capital, credentials) cannot change while a session is running
async fn update_config(Json(incoming): Json<Config>) -> (StatusCode, Json<Value>) {
    if incoming.exchange.api_key == REDACTED
        || incoming.exchange.api_secret == REDACTED
        || incoming.sentiment.api_key == REDACTED
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "redacted credential placeholders cannot be written back; \
                          resubmit with real values or empty strings"
            })),
        );
    }

    if let Err(e) = config::validate_config(&incoming) {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e })));
    }

    let running = engine::handle()
        .map(|h| h.control().is_running())
        .unwrap_or(false);

    if running {
        let conflict = with_config(|current| {
            current.engine.symbols != incoming.engine.symbols
                || current.engine.capital_per_symbol != incoming.engine.capital_per_symbol
                || current.exchange.api_key != incoming.exchange.api_key
                || current.exchange.api_secret != incoming.exchange.api_secret
                || current.sentiment.api_key != incoming.sentiment.api_key
        });
        if conflict {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "symbols, capital and credentials cannot change while running"
                })),
            );
        }
    }

    if let Err(e) = config::update_config_section(|cfg| *cfg = incoming, true) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e })),
        );
    }

    if let Some(handle) = engine::handle() {
        let _ = handle.send(EngineCommand::ConfigUpdate);
    }

    (StatusCode::OK, Json(json!({ "updated": true })))
}

#[derive(Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn list_events(Query(query): Query<EventsQuery>) -> Json<Value> {
    let limit = query.limit.unwrap_or(100).min(500);
    Json(json!({ "events": events::recent_events(limit) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Round-tripping the redacted config read through the update
    // endpoint must never replace stored credentials with "***"
    #[tokio::test]
    async fn redacted_credentials_are_rejected_on_write() {
        let mut cfg = Config::default();
        cfg.exchange.api_key = REDACTED.to_string();
        cfg.exchange.api_secret = REDACTED.to_string();

        let (status, _) = update_config(Json(cfg)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut cfg = Config::default();
        cfg.sentiment.api_key = REDACTED.to_string();

        let (status, _) = update_config(Json(cfg)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
