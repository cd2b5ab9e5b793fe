//! Catalyst orchestration engine entrypoint.
//!
//! Wires the Store Gateway, the downstream service client, the health
//! monitor, news intake, the candidate reducer, the trading-cycle state
//! machine, and the position coordinator, then serves the operator HTTP
//! API alongside the background loops that drive a live cycle.

use anyhow::{Context, Result};
use catalyst_orchestrator::client::ServiceClient;
use catalyst_orchestrator::config::Config;
use catalyst_orchestrator::cycle::{CycleEngine, CycleScheduler};
use catalyst_orchestrator::health::HealthMonitor;
use catalyst_orchestrator::news::{ImpactComputer, NewsIngest};
use catalyst_orchestrator::position::{MarkToMarket, PositionCoordinator};
use catalyst_orchestrator::reducer::ReducerPipeline;
use catalyst_orchestrator::store::{StoreGateway, StorePool};
use catalyst_orchestrator::{api, metrics, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("catalyst orchestration engine starting");

    let config = Arc::new(Config::from_env());

    let metrics_handle = metrics::install();

    let pool = StorePool::open(&config.store_path, config.store_pool_size).context("open store pool")?;
    let store = Arc::new(StoreGateway::new(pool));
    store.seed_default_risk_parameters().await.context("seed default risk parameters")?;
    info!(path = %config.store_path, "store initialized");

    let client = Arc::new(ServiceClient::new(&config));
    let health = Arc::new(HealthMonitor::new(client.clone(), &config));
    let engine = Arc::new(CycleEngine::new(store.clone()));
    let positions = Arc::new(PositionCoordinator::new(client.clone(), store.clone()));

    let state = AppState {
        store: store.clone(),
        client: client.clone(),
        health: health.clone(),
        engine: engine.clone(),
        positions: positions.clone(),
        config: config.clone(),
        metrics_handle,
    };

    spawn_health_monitor(health.clone());
    spawn_news_loops(client.clone(), store.clone(), &config);
    spawn_scan_loop(client, store, engine, positions, config.clone());

    let app = api::router()
        .with_state(state)
        .layer(axum::middleware::from_fn(
            catalyst_orchestrator::middleware::logging::request_logging_simple,
        ))
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = config.bind_addr.parse().context("invalid BIND_ADDR")?;
    let listener = TcpListener::bind(addr).await.context("bind listener")?;
    info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn spawn_health_monitor(health: Arc<HealthMonitor>) {
    tokio::spawn(async move {
        health
            .run(|| {
                matches!(
                    catalyst_orchestrator::cycle::scheduler::current_session(chrono::Utc::now()),
                    catalyst_orchestrator::cycle::MarketSession::Regular
                )
            })
            .await;
    });
}

fn spawn_news_loops(client: Arc<ServiceClient>, store: Arc<StoreGateway>, config: &Config) {
    let ingest = Arc::new(NewsIngest::new(client.clone(), store.clone(), config));
    tokio::spawn(async move { ingest.run().await });

    let impact = Arc::new(ImpactComputer::new(client, store, config));
    tokio::spawn(async move { impact.run().await });
}

fn spawn_scan_loop(
    client: Arc<ServiceClient>,
    store: Arc<StoreGateway>,
    engine: Arc<CycleEngine>,
    positions: Arc<PositionCoordinator>,
    config: Arc<Config>,
) {
    let pipeline = Arc::new(ReducerPipeline::new(client.clone(), store.clone(), config.stage_fanout));
    let mark_to_market = Arc::new(MarkToMarket::new(client, store.clone()));
    let scheduler = CycleScheduler::new();

    tokio::spawn(async move {
        scheduler
            .run(move |session| {
                let engine = engine.clone();
                let store = store.clone();
                let pipeline = pipeline.clone();
                let positions = positions.clone();
                let mark_to_market = mark_to_market.clone();
                async move {
                    let Ok(Some(cycle)) = engine.active().await else { return };
                    if let Err(e) = mark_to_market.run_once(&cycle.id).await {
                        warn!(error = %e, "mark-to-market failed");
                    }
                    if !cycle.status.is_live() || session.is_monitoring_only() {
                        return;
                    }

                    let Ok(open) = store.count_open_positions(&cycle.id).await else { return };
                    let slots = cycle.max_positions.saturating_sub(open) as usize;

                    match pipeline.run(&cycle.id, slots, cycle.mode, cycle.risk_level).await {
                        Ok(results) => {
                            let started = std::time::Instant::now();
                            let selected = results.iter().filter(|r| r.selected);
                            for candidate in selected {
                                match positions.open_from_candidate(&cycle.id, cycle.mode, cycle.risk_level, candidate).await {
                                    Ok(Some(_)) => metrics::record_position_opened(&candidate.symbol),
                                    Ok(None) => {}
                                    Err(e) => error!(error = %e, symbol = %candidate.symbol, "failed to open position"),
                                }
                            }
                            metrics::record_scan_tick(&cycle.id, results.iter().filter(|r| r.selected).count(), started.elapsed().as_millis() as u64);
                        }
                        Err(e) => error!(cycle_id = %cycle.id, error = %e, "scan tick failed"),
                    }
                }
            })
            .await;
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalyst_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
