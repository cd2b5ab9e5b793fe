//! Stage 4 — Risk: validates every Stage 3 survivor against the
//! risk-manager service (spec §6) using the currently effective
//! `RiskParameters` to size the trial quantity, keeping up to the top 10
//! that pass (spec §4.5). This stage is a pure filter — approval is
//! binary, so ranking carries forward the Stage 3 composite order rather
//! than introducing a scoring component `ScanScores` (spec §3) has no slot
//! for.

use crate::client::ServiceClient;
use crate::models::{CycleMode, RiskEvent, RiskParameter, RiskSeverity};
use crate::position::sizing::quantity_for;
use crate::reducer::technical_stage::TechnicalCandidate;
use crate::store::StoreGateway;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

pub const MAX_AFTER_RISK: usize = 10;

#[derive(Debug, Serialize)]
struct ValidateTradeRequest<'a> {
    symbol: &'a str,
    side: &'a str,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct ValidateTradeResponse {
    approved: bool,
    #[serde(default)]
    reason: Option<String>,
}

pub struct RiskApprovedCandidate {
    pub technical: TechnicalCandidate,
}

pub async fn validate_and_filter(
    client: &ServiceClient,
    store: &StoreGateway,
    cycle_id: &str,
    candidates: Vec<TechnicalCandidate>,
    mode: CycleMode,
    risk_level: f64,
    _effective: &HashMap<String, RiskParameter>,
) -> Vec<RiskApprovedCandidate> {
    let mut approved = Vec::new();
    for candidate in candidates {
        let symbol = candidate.catalyst.universe.symbol.clone();
        let security_id = candidate.catalyst.security_id;
        let price = candidate.catalyst.universe.price;
        let quantity = quantity_for(mode, risk_level, price);
        let request = ValidateTradeRequest { symbol: &symbol, side: "buy", quantity };

        match client
            .post_json::<_, ValidateTradeResponse>("risk-manager", "/api/v1/validate-trade", &request)
            .await
        {
            Ok(response) if response.approved => {
                approved.push(RiskApprovedCandidate { technical: candidate });
            }
            Ok(response) => {
                tracing::info!(symbol, reason = response.reason.as_deref().unwrap_or("unspecified"), "risk rejected candidate");
            }
            Err(e) => {
                warn!(symbol, error = %e, "risk-manager unreachable, dropping candidate");
                let event = RiskEvent {
                    id: 0,
                    event_type: "risk_manager_unavailable".into(),
                    severity: RiskSeverity::Warning,
                    cycle_id: Some(cycle_id.to_string()),
                    security_id: Some(security_id),
                    message: format!("{symbol}: risk-manager validate-trade call failed, candidate dropped"),
                    data: json!({"symbol": symbol, "error": e.to_string()}),
                    created_at: Utc::now(),
                    acknowledged: false,
                    acknowledged_at: None,
                };
                if let Err(e) = store.append_risk_event(&event).await {
                    warn!(symbol, error = %e, "failed to record risk-manager-unavailable risk event");
                }
            }
        }
    }

    approved.truncate(MAX_AFTER_RISK);
    approved
}
