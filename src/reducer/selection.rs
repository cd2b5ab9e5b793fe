//! Stage 5 — Selection: the final cut, bounded by remaining position
//! capacity on the cycle, never by a flat constant (spec §4.5). The
//! composite score is the weighted sum of the four `ScanScores` components
//! (spec §3), with weights sourced from effective `RiskParameters` so
//! operators can retune the pipeline without a redeploy (spec §9).

use crate::models::{RiskParameter, ScanResult, ScanScores};
use crate::reducer::risk_stage::RiskApprovedCandidate;
use crate::store::StoreGateway;
use chrono::Utc;
use std::collections::HashMap;

pub const MAX_FINAL_SELECTION: usize = 5;

struct Weights {
    momentum: f64,
    volume: f64,
    catalyst: f64,
    technical: f64,
}

fn weights_from(effective: &HashMap<String, RiskParameter>) -> Weights {
    Weights {
        momentum: effective.get("weight_momentum").map(|p| p.value).unwrap_or(0.15),
        volume: effective.get("weight_volume").map(|p| p.value).unwrap_or(0.15),
        catalyst: effective.get("weight_catalyst").map(|p| p.value).unwrap_or(0.35),
        technical: effective.get("weight_technical").map(|p| p.value).unwrap_or(0.35),
    }
}

/// Builds and persists the final `ScanResult` rows for `cycle_id`, ranking
/// and marking as many as fit within `slots_available` (which is
/// `max_positions - open_positions`, computed by the caller).
pub async fn select_and_persist(
    store: &StoreGateway,
    cycle_id: &str,
    candidates: Vec<RiskApprovedCandidate>,
    slots_available: usize,
    effective: &HashMap<String, RiskParameter>,
) -> anyhow::Result<Vec<ScanResult>> {
    let weights = weights_from(effective);
    let scan_time = Utc::now();
    let scan_time_id = store.resolve_time(scan_time).await?;

    let mut scored: Vec<(f64, RiskApprovedCandidate)> = candidates
        .into_iter()
        .map(|candidate| {
            let tech = &candidate.technical;
            let composite = tech.catalyst.universe.momentum_score * weights.momentum
                + tech.catalyst.universe.volume_score * weights.volume
                + tech.catalyst.catalyst_score * weights.catalyst
                + tech.technical_score * weights.technical;
            (composite, candidate)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_FINAL_SELECTION);

    let selected_count = slots_available.min(scored.len());

    let mut results = Vec::with_capacity(scored.len());
    for (idx, (composite, candidate)) in scored.into_iter().enumerate() {
        let tech = &candidate.technical;
        results.push(ScanResult {
            id: 0,
            cycle_id: cycle_id.to_string(),
            security_id: tech.catalyst.security_id,
            symbol: tech.catalyst.universe.symbol.clone(),
            scan_time_id,
            scan_time,
            scores: ScanScores {
                momentum: tech.catalyst.universe.momentum_score,
                volume: tech.catalyst.universe.volume_score,
                catalyst: tech.catalyst.catalyst_score,
                technical: tech.technical_score,
                composite,
            },
            price: tech.catalyst.universe.price,
            volume: tech.catalyst.universe.volume,
            change_pct: tech.catalyst.universe.change_pct,
            selected: idx < selected_count,
            rank: if idx < selected_count { Some(idx as u32 + 1) } else { None },
        });
    }

    store.insert_scan_results(&results).await?;
    let ranked: Vec<(i64, u32)> = results
        .iter()
        .filter_map(|r| r.rank.map(|rank| (r.security_id, rank)))
        .collect();
    store.mark_selected(cycle_id, scan_time_id, &ranked).await?;

    Ok(results)
}
