//! Periodic liveness probing of the seven downstream services (spec §4.3).
//!
//! Grounded in the teacher's `route_quality/prober.rs::run` probe loop
//! (`tokio::select!` over per-check `interval()`s, update-then-check after
//! each tick) but collapsed to one cadence that itself varies with the
//! market session, and one outcome kind (reachable/unreachable) rather than
//! ICMP/TCP/TLS/DNS/traceroute.

use crate::client::ServiceClient;
use crate::config::Config;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceHealth {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

struct History {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl History {
    fn new(capacity: usize) -> Self {
        Self { outcomes: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, ok: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(ok);
    }

    /// Aggregates the last N probe outcomes per spec §4.3:
    /// all healthy -> Healthy, at least one success -> Degraded,
    /// zero successes with a full window -> Unhealthy,
    /// no observations yet -> Offline.
    fn aggregate(&self) -> ServiceHealth {
        if self.outcomes.is_empty() {
            return ServiceHealth::Offline;
        }
        let successes = self.outcomes.iter().filter(|ok| **ok).count();
        if successes == self.outcomes.len() {
            ServiceHealth::Healthy
        } else if successes > 0 {
            ServiceHealth::Degraded
        } else {
            ServiceHealth::Unhealthy
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub services: HashMap<String, ServiceHealth>,
    pub overall: ServiceHealth,
}

pub struct HealthMonitor {
    client: Arc<ServiceClient>,
    history: RwLock<HashMap<String, History>>,
    history_len: usize,
    market_interval: std::time::Duration,
    off_hours_interval: std::time::Duration,
    service_names: Vec<String>,
}

impl HealthMonitor {
    pub fn new(client: Arc<ServiceClient>, config: &Config) -> Self {
        let service_names: Vec<String> = config.services.iter().map(|(name, _)| name.to_string()).collect();
        let mut history = HashMap::new();
        for name in &service_names {
            history.insert(name.clone(), History::new(config.health_history_len));
        }
        Self {
            client,
            history: RwLock::new(history),
            history_len: config.health_history_len,
            market_interval: config.health_probe_interval_market,
            off_hours_interval: config.health_probe_interval_off_hours,
            service_names,
        }
    }

    /// Runs forever, re-probing on a cadence that shortens during market
    /// hours (spec §4.5's session schedule governs this too).
    pub async fn run(self: Arc<Self>, market_open: impl Fn() -> bool + Send + Sync + 'static) {
        info!("starting health monitor");
        loop {
            let cadence = if market_open() { self.market_interval } else { self.off_hours_interval };
            let mut tick = interval(cadence);
            tick.tick().await; // consume the immediate first tick
            self.probe_all().await;
            tick.tick().await;
        }
    }

    pub async fn probe_all(&self) {
        for name in &self.service_names {
            let ok = self.client.probe_health(name).await.is_ok();
            if !ok {
                warn!(service = %name, "health probe failed");
            }
            let mut history = self.history.write();
            history
                .entry(name.clone())
                .or_insert_with(|| History::new(self.history_len))
                .push(ok);
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let history = self.history.read();
        let mut services = HashMap::new();
        for name in &self.service_names {
            let health = history.get(name).map(History::aggregate).unwrap_or(ServiceHealth::Offline);
            services.insert(name.clone(), health);
        }
        let overall = Self::combine(services.values().copied());
        HealthSnapshot { services, overall }
    }

    /// Worst-of aggregation: the system is only as healthy as its worst
    /// gating dependency.
    fn combine(mut healths: impl Iterator<Item = ServiceHealth>) -> ServiceHealth {
        use ServiceHealth::*;
        let mut worst = Healthy;
        while let Some(h) = healths.next() {
            worst = match (worst, h) {
                (Offline, _) | (_, Offline) => Offline,
                (Unhealthy, _) | (_, Unhealthy) => Unhealthy,
                (Degraded, _) | (_, Degraded) => Degraded,
                _ => Healthy,
            };
        }
        worst
    }

    /// Admission gate used by the cycle engine before a scan tick: refuses
    /// to proceed if any gating service is unhealthy or offline.
    pub fn gating_services_ok(&self, gating: &[&str]) -> bool {
        let history = self.history.read();
        gating.iter().all(|name| {
            matches!(
                history.get(*name).map(History::aggregate),
                Some(ServiceHealth::Healthy) | Some(ServiceHealth::Degraded)
            )
        })
    }
}
