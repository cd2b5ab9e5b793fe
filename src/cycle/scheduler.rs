//! Market-session-aware scan scheduler (spec §4.5, §4.6). Cadence widens
//! outside regular trading hours; a tick that is still running when the
//! next one comes due is skipped rather than queued.

use chrono::{Timelike, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSession {
    PreMarket,
    Regular,
    AfterHours,
    Closed,
}

impl MarketSession {
    /// Monitoring-only outside `Regular` — scans still happen, just slower,
    /// and the candidate reducer is expected to surface fewer (or no)
    /// selections when liquidity is thin.
    pub fn is_monitoring_only(self) -> bool {
        !matches!(self, MarketSession::Regular)
    }
}

/// US equities session boundaries in Eastern time, approximated here as a
/// fixed UTC-5 offset (no DST table) — acceptable for scheduling cadence,
/// which only needs day-of-week/hour granularity, not the exact minute.
pub fn current_session(now: chrono::DateTime<Utc>) -> MarketSession {
    use chrono::Weekday::*;
    let weekday = now.weekday();
    if matches!(weekday, Sat | Sun) {
        return MarketSession::Closed;
    }
    let eastern_hour = (now.hour() as i64 - 5).rem_euclid(24);
    let minute = now.minute();
    let minutes_since_midnight = eastern_hour * 60 + minute as i64;

    match minutes_since_midnight {
        m if (4 * 60..9 * 60 + 30).contains(&m) => MarketSession::PreMarket,
        m if (9 * 60 + 30..16 * 60).contains(&m) => MarketSession::Regular,
        m if (16 * 60..20 * 60).contains(&m) => MarketSession::AfterHours,
        _ => MarketSession::Closed,
    }
}

pub fn cadence_for(session: MarketSession) -> Duration {
    match session {
        MarketSession::PreMarket => Duration::from_secs(300),
        MarketSession::Regular => Duration::from_secs(900),
        MarketSession::AfterHours => Duration::from_secs(1800),
        MarketSession::Closed => Duration::from_secs(3600),
    }
}

pub struct CycleScheduler {
    busy: AtomicBool,
}

impl CycleScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { busy: AtomicBool::new(false) })
    }

    /// Runs `tick` forever at the session-appropriate cadence. If a tick is
    /// still in flight when the next one comes due, the new one is skipped
    /// and logged rather than allowed to overlap the store/session state.
    pub async fn run<F, Fut>(self: Arc<Self>, tick: F)
    where
        F: Fn(MarketSession) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        loop {
            let session = current_session(Utc::now());
            let cadence = cadence_for(session);
            tokio::time::sleep(cadence).await;

            if self.busy.swap(true, Ordering::SeqCst) {
                warn!(?session, "previous scan tick still running, skipping this tick");
                continue;
            }

            info!(?session, cadence_secs = cadence.as_secs(), "scan tick starting");
            tick(session).await;
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classifies_regular_session() {
        let t = Utc.with_ymd_and_hms(2026, 7, 27, 15, 0, 0).unwrap(); // 10:00 ET
        assert_eq!(current_session(t), MarketSession::Regular);
    }

    #[test]
    fn classifies_weekend_as_closed() {
        let t = Utc.with_ymd_and_hms(2026, 7, 25, 15, 0, 0).unwrap(); // Saturday
        assert_eq!(current_session(t), MarketSession::Closed);
    }

    #[test]
    fn cadence_widens_outside_regular_hours() {
        assert!(cadence_for(MarketSession::Closed) > cadence_for(MarketSession::Regular));
    }
}
