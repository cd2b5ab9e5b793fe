//! Stage 1 — Universe: pull the broad candidate set from the scanner
//! service (spec §4.5, §6). Up to 100 symbols pass through unfiltered;
//! later stages narrow from here. The scanner's wire contract carries only
//! `symbol/price/volume/change_pct`; momentum and volume component scores
//! (needed by `ScanScores`, spec §3) are derived here rather than sourced
//! externally.

use crate::client::ServiceClient;
use crate::error::AppResult;
use serde::{Deserialize, Serialize};

pub const MAX_UNIVERSE: usize = 100;
const HOURS_BACK: u32 = 24;

#[derive(Debug, Clone)]
pub struct UniverseCandidate {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub change_pct: f64,
    pub momentum_score: f64,
    pub volume_score: f64,
}

#[derive(Debug, Serialize)]
struct ScanRequest {
    hours_back: u32,
}

#[derive(Debug, Deserialize)]
struct ScanCandidate {
    symbol: String,
    price: f64,
    volume: f64,
    change_pct: f64,
}

#[derive(Debug, Deserialize)]
struct ScannerResponse {
    candidates: Vec<ScanCandidate>,
}

pub async fn fetch_universe(client: &ServiceClient) -> AppResult<Vec<UniverseCandidate>> {
    let response: ScannerResponse = client
        .post_json("scanner", "/api/v1/scan", &ScanRequest { hours_back: HOURS_BACK })
        .await?;

    let mut candidates: Vec<UniverseCandidate> = response
        .candidates
        .into_iter()
        .map(|c| UniverseCandidate {
            momentum_score: momentum_score(c.change_pct),
            volume_score: volume_score(c.volume),
            symbol: c.symbol,
            price: c.price,
            volume: c.volume,
            change_pct: c.change_pct,
        })
        .collect();
    candidates.truncate(MAX_UNIVERSE);
    Ok(candidates)
}

/// Normalizes a percentage move onto a 0-100 scale centered on no-change.
fn momentum_score(change_pct: f64) -> f64 {
    (50.0 + change_pct * 5.0).clamp(0.0, 100.0)
}

/// Log-scaled so a handful of mega-cap names don't saturate the range.
fn volume_score(volume: f64) -> f64 {
    if volume <= 0.0 {
        return 0.0;
    }
    (volume.log10() * 10.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn momentum_score_centers_on_flat_change() {
        assert!((momentum_score(0.0) - 50.0).abs() < 1e-9);
        assert!(momentum_score(5.0) > 50.0);
        assert!(momentum_score(-5.0) < 50.0);
    }

    #[test]
    fn volume_score_is_nonnegative_and_bounded() {
        assert_eq!(volume_score(0.0), 0.0);
        assert!(volume_score(1_000_000.0) <= 100.0);
    }
}
