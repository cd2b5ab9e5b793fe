//! Keyword-based catalyst classification (spec §4.4, §6). Closed 12-way
//! enum, matched by counting keyword hits in a lowercased headline — no
//! ML model, no runtime-extensible category list.

use crate::models::CatalystType;

/// Picks the `CatalystType` with the most keyword hits in `headline`.
/// Ties break toward the earlier variant in `CatalystType::ALL`; no hits
/// at all classifies as `General`.
pub fn classify(headline: &str) -> CatalystType {
    let lower = headline.to_lowercase();
    let mut best = CatalystType::General;
    let mut best_hits = 0usize;

    for kind in CatalystType::ALL {
        if kind == CatalystType::General {
            continue;
        }
        let hits = kind.keywords().iter().filter(|kw| lower.contains(*kw)).count();
        if hits > best_hits {
            best_hits = hits;
            best = kind;
        }
    }
    best
}

/// Base weight per catalyst type before recency/reliability adjustment.
/// FDA and M&A catalysts move price the most, per the original system's
/// observed impact distributions; general news carries no weight.
pub fn base_weight(kind: CatalystType) -> f64 {
    match kind {
        CatalystType::FdaApproval => 1.0,
        CatalystType::MergerAcquisition => 0.95,
        CatalystType::Earnings => 0.8,
        CatalystType::AnalystUpgrade | CatalystType::AnalystDowngrade => 0.6,
        CatalystType::Regulatory | CatalystType::Lawsuit => 0.55,
        CatalystType::ProductLaunch | CatalystType::Partnership => 0.5,
        CatalystType::ManagementChange => 0.4,
        CatalystType::InsiderTrading => 0.35,
        CatalystType::General => 0.0,
    }
}

/// Combines base weight, source reliability, and exponential recency decay
/// (half-life = `lookback_hours / 2`) into a single catalyst score used by
/// Stage 2 of the candidate reducer.
pub fn score(kind: CatalystType, source_reliability: f64, age_hours: f64, lookback_hours: f64) -> f64 {
    if age_hours > lookback_hours {
        return 0.0;
    }
    let half_life = (lookback_hours / 2.0).max(1.0);
    let recency = 0.5f64.powf(age_hours / half_life);
    base_weight(kind) * source_reliability.clamp(0.0, 1.0) * recency
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_fda_headline() {
        assert_eq!(classify("FDA approval granted for new cancer drug"), CatalystType::FdaApproval);
    }

    #[test]
    fn classifies_earnings_headline() {
        assert_eq!(classify("Company beats earnings guidance, revenue up 20%"), CatalystType::Earnings);
    }

    #[test]
    fn falls_back_to_general_with_no_hits() {
        assert_eq!(classify("Local weather forecast calls for rain"), CatalystType::General);
    }

    #[test]
    fn score_decays_with_age_and_zeroes_past_lookback() {
        let fresh = score(CatalystType::FdaApproval, 0.9, 0.0, 24.0);
        let stale = score(CatalystType::FdaApproval, 0.9, 20.0, 24.0);
        assert!(fresh > stale);
        assert_eq!(score(CatalystType::FdaApproval, 0.9, 25.0, 24.0), 0.0);
    }
}
