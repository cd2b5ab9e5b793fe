//! Stage 3 — Technical: concurrently queries the pattern and technical
//! services for every Stage 2 survivor and keeps the top 20 by composite
//! score (spec §4.5, §6). A candidate is dropped, not defaulted, if either
//! call fails — a partial technical read is worse than no read, and each
//! drop is surfaced as a warning RiskEvent (spec §4.5 step 3, §4.6/§4.7
//! failure table).

use crate::client::ServiceClient;
use crate::models::{RiskEvent, RiskSeverity};
use crate::reducer::catalyst_stage::CatalystCandidate;
use crate::store::StoreGateway;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

pub const MAX_AFTER_TECHNICAL: usize = 20;
const TIMEFRAME: &str = "15m";

#[derive(Debug, Serialize)]
struct PatternRequest<'a> {
    symbol: &'a str,
    timeframe: &'a str,
}

#[derive(Debug, Deserialize)]
struct PatternResponse {
    score: f64,
}

#[derive(Debug, Serialize)]
struct TechnicalRequest<'a> {
    symbol: &'a str,
    timeframe: &'a str,
}

#[derive(Debug, Deserialize)]
struct TechnicalResponse {
    score: f64,
}

pub struct TechnicalCandidate {
    pub catalyst: CatalystCandidate,
    pub pattern_score: f64,
    pub technical_score: f64,
}

pub async fn score_and_filter(
    client: &ServiceClient,
    store: &StoreGateway,
    cycle_id: &str,
    candidates: Vec<CatalystCandidate>,
    fanout: usize,
) -> Vec<TechnicalCandidate> {
    let fanout = fanout.max(1);
    let mut scored: Vec<TechnicalCandidate> = stream::iter(candidates)
        .map(|candidate| async move {
            let symbol = candidate.universe.symbol.clone();
            let pattern_fut = client.post_json::<_, PatternResponse>(
                "pattern",
                "/api/v1/patterns/detect",
                &PatternRequest { symbol: &symbol, timeframe: TIMEFRAME },
            );
            let technical_fut = client.post_json::<_, TechnicalResponse>(
                "technical",
                "/api/v1/indicators/calculate",
                &TechnicalRequest { symbol: &symbol, timeframe: TIMEFRAME },
            );
            match tokio::join!(pattern_fut, technical_fut) {
                (Ok(pattern), Ok(technical)) => Some(TechnicalCandidate {
                    catalyst: candidate,
                    pattern_score: pattern.score,
                    technical_score: technical.score,
                }),
                _ => {
                    warn!(symbol, "technical stage dropping candidate: pattern/technical call failed");
                    let event = RiskEvent {
                        id: 0,
                        event_type: "technical_stage_dropped_candidate".into(),
                        severity: RiskSeverity::Warning,
                        cycle_id: Some(cycle_id.to_string()),
                        security_id: Some(candidate.security_id),
                        message: format!("{symbol}: pattern or technical service call failed, candidate dropped"),
                        data: json!({"symbol": symbol}),
                        created_at: Utc::now(),
                        acknowledged: false,
                        acknowledged_at: None,
                    };
                    if let Err(e) = store.append_risk_event(&event).await {
                        warn!(symbol, error = %e, "failed to record technical-stage drop risk event");
                    }
                    None
                }
            }
        })
        .buffer_unordered(fanout)
        .filter_map(|r| async move { r })
        .collect()
        .await;

    scored.sort_by(|a, b| composite(b).partial_cmp(&composite(a)).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_AFTER_TECHNICAL);
    scored
}

fn composite(c: &TechnicalCandidate) -> f64 {
    c.pattern_score * 0.5 + c.technical_score * 0.5
}
