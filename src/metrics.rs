//! Prometheus metrics (SPEC_FULL §10.4). Ambient observability, not a spec
//! feature — wired up regardless of the "no real-time latency guarantees"
//! non-goal, the same way the teacher always exposes `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("install prometheus recorder")
}

pub fn record_scan_tick(cycle_id: &str, selected: usize, elapsed_ms: u64) {
    metrics::histogram!("scan_tick_duration_ms", elapsed_ms as f64, "cycle_id" => cycle_id.to_string());
    metrics::gauge!("scan_tick_selected", selected as f64, "cycle_id" => cycle_id.to_string());
}

pub fn record_service_call(service: &str, outcome: &'static str) {
    metrics::counter!("service_calls_total", 1, "service" => service.to_string(), "outcome" => outcome);
}

pub fn record_position_opened(symbol: &str) {
    metrics::counter!("positions_opened_total", 1, "symbol" => symbol.to_string());
}

pub fn record_position_closed(symbol: &str, reason: &str) {
    metrics::counter!("positions_closed_total", 1, "symbol" => symbol.to_string(), "reason" => reason.to_string());
}

pub fn record_risk_event(severity: &'static str) {
    metrics::counter!("risk_events_total", 1, "severity" => severity);
}

pub fn set_health(service: &str, healthy: bool) {
    metrics::gauge!("service_health", if healthy { 1.0 } else { 0.0 }, "service" => service.to_string());
}
