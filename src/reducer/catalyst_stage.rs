//! Stage 2 — Catalyst: scores the universe against recent news and keeps
//! the top 35 (spec §4.5). News is read directly from the store rather than
//! a downstream call, since ingest already wrote it there (spec §11).

use crate::news::catalyst;
use crate::reducer::universe::UniverseCandidate;
use crate::store::StoreGateway;
use chrono::Utc;

pub const MAX_AFTER_CATALYST: usize = 35;
pub const CATALYST_LOOKBACK_HOURS: f64 = 24.0;

/// Minimum catalyst strength a symbol must clear to occupy one of the
/// catalyst-stage slots (spec §4.5 step 2) — a symbol with no qualifying
/// news scores 0.0 and is dropped rather than riding through on a default.
pub const MIN_CATALYST_STRENGTH: f64 = 0.05;

pub struct CatalystCandidate {
    pub universe: UniverseCandidate,
    pub security_id: i64,
    pub catalyst_score: f64,
}

pub async fn score_and_filter(
    store: &StoreGateway,
    universe: Vec<UniverseCandidate>,
) -> anyhow::Result<Vec<CatalystCandidate>> {
    let since = Utc::now() - chrono::Duration::hours(CATALYST_LOOKBACK_HOURS as i64);
    let mut scored = Vec::with_capacity(universe.len());

    for candidate in universe {
        let security_id = store.resolve_security(&candidate.symbol).await?;
        let news = store.news_for_security_since(security_id, since).await?;

        let catalyst_score = news
            .iter()
            .map(|n| {
                let age_hours = (Utc::now() - n.published_at).num_minutes() as f64 / 60.0;
                catalyst::score(n.catalyst_type, n.source_reliability, age_hours, CATALYST_LOOKBACK_HOURS)
            })
            .fold(0.0_f64, f64::max);

        scored.push(CatalystCandidate { universe: candidate, security_id, catalyst_score });
    }

    scored.retain(|c| c.catalyst_score >= MIN_CATALYST_STRENGTH);
    scored.sort_by(|a, b| b.catalyst_score.partial_cmp(&a.catalyst_score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(MAX_AFTER_CATALYST);
    Ok(scored)
}
