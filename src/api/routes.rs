//! HTTP surface for operator control and observability (spec §5).
//!
//! Cycle control mutates through the `CycleEngine`; everything else is a
//! read of current state. `/metrics` and the debug analyze endpoint are
//! ambient/non-gating surfaces layered in under SPEC_FULL §10/§11.

use crate::error::AppResult;
use crate::models::{CycleMode, TradingCycle};
use crate::AppState;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/v1/cycles/start", post(start_cycle))
        .route("/api/v1/cycles/active", get(active_cycle))
        .route("/api/v1/cycles/:id", get(get_cycle))
        .route("/api/v1/cycles/:id/pause", post(pause_cycle))
        .route("/api/v1/cycles/:id/resume", post(resume_cycle))
        .route("/api/v1/cycles/:id/stop", post(stop_cycle))
        .route("/api/v1/cycles/:id/emergency-stop", post(emergency_stop_cycle))
        .route("/api/v1/risk/parameters", get(risk_parameters))
        .route("/api/v1/symbols/:symbol/analyze", get(analyze_symbol))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.health.snapshot();
    Json(json!({"success": true, "overall": snapshot.overall, "services": snapshot.services}))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics_handle.render()
}

#[derive(Debug, Deserialize)]
struct StartCycleRequest {
    mode: CycleMode,
    #[serde(default = "default_scan_cadence")]
    scan_cadence_secs: u32,
    #[serde(default = "default_max_positions")]
    max_positions: u32,
    #[serde(default = "default_risk_level")]
    risk_level: f64,
}

fn default_scan_cadence() -> u32 {
    900
}

fn default_max_positions() -> u32 {
    5
}

fn default_risk_level() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct CycleResponse {
    success: bool,
    cycle: TradingCycle,
}

async fn start_cycle(
    State(state): State<AppState>,
    Json(request): Json<StartCycleRequest>,
) -> AppResult<Json<CycleResponse>> {
    let cycle = state
        .engine
        .start(request.mode, request.scan_cadence_secs, request.max_positions, request.risk_level)
        .await?;
    Ok(Json(CycleResponse { success: true, cycle }))
}

async fn active_cycle(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    match state.engine.active().await? {
        Some(cycle) => Ok(Json(json!({"success": true, "cycle": cycle}))),
        None => Ok(Json(json!({"success": true, "cycle": null}))),
    }
}

async fn get_cycle(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<CycleResponse>> {
    let cycle = state.engine.get(&id).await?;
    Ok(Json(CycleResponse { success: true, cycle }))
}

async fn pause_cycle(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    state.engine.pause(&id).await?;
    Ok(Json(json!({"success": true})))
}

async fn resume_cycle(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<Json<serde_json::Value>> {
    state.engine.resume(&id).await?;
    Ok(Json(json!({"success": true})))
}

#[derive(Debug, Deserialize, Default)]
struct StopRequest {
    #[serde(default)]
    reason: Option<String>,
}

async fn stop_cycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<StopRequest>>,
) -> AppResult<Json<serde_json::Value>> {
    let reason = body.and_then(|b| b.0.reason).unwrap_or_else(|| "operator requested stop".into());
    state.engine.request_stop(&id, &reason).await?;
    state.engine.finalize_stop(&id).await?;
    Ok(Json(json!({"success": true})))
}

async fn emergency_stop_cycle(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<StopRequest>>,
) -> AppResult<Json<serde_json::Value>> {
    let reason = body.and_then(|b| b.0.reason).unwrap_or_else(|| "emergency stop requested".into());
    state.engine.emergency_stop(&id, &reason).await?;
    let closed = state.positions.emergency_liquidate(&id, state.config.emergency_exit_deadline).await?;
    Ok(Json(json!({"success": true, "positions_liquidated": closed})))
}

async fn risk_parameters(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let params = state.store.effective_risk_parameters(chrono::Utc::now()).await?;
    Ok(Json(json!({"success": true, "parameters": params})))
}

/// Non-gating debug endpoint (SPEC_FULL §11): runs a best-effort single-
/// symbol read across the downstream services and reports whichever calls
/// succeeded, rather than failing the whole request on a partial outage —
/// this mirrors the original system's `analyze_symbol` tolerance, kept here
/// strictly for operator debugging, never on the trading-decision path.
async fn analyze_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Json<serde_json::Value> {
    let body = json!({"symbol": symbol.clone(), "timeframe": "15m"});
    let technical = state
        .client
        .post_json::<_, serde_json::Value>("technical", "/api/v1/indicators/calculate", &body)
        .await
        .ok();
    let pattern = state
        .client
        .post_json::<_, serde_json::Value>("pattern", "/api/v1/patterns/detect", &body)
        .await
        .ok();
    let news = match state.store.resolve_security(&symbol).await {
        Ok(security_id) => {
            let since = chrono::Utc::now() - chrono::Duration::hours(24);
            state
                .store
                .news_for_security_since(security_id, since)
                .await
                .ok()
                .map(|events| json!(events))
        }
        Err(_) => None,
    };

    Json(json!({
        "success": true,
        "symbol": symbol,
        "technical": technical,
        "pattern": pattern,
        "news": news,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cycle_params_match_spec_defaults() {
        assert_eq!(default_scan_cadence(), 900);
        assert_eq!(default_max_positions(), 5);
        assert_eq!(default_risk_level(), 1.0);
    }
}
