//! Catalyst orchestration engine library.
//!
//! Exposes the module tree shared between the `catalyst-orchestrator`
//! binary and its integration tests: the Store Gateway, the downstream
//! service client, the health monitor, news intake, the candidate reducer
//! pipeline, the trading-cycle state machine, and the position coordinator.

pub mod api;
pub mod client;
pub mod config;
pub mod cycle;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod news;
pub mod position;
pub mod reducer;
pub mod store;

use std::sync::Arc;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<store::StoreGateway>,
    pub client: Arc<client::ServiceClient>,
    pub health: Arc<health::HealthMonitor>,
    pub engine: Arc<cycle::CycleEngine>,
    pub positions: Arc<position::PositionCoordinator>,
    pub config: Arc<config::Config>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}
