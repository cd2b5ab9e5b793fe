//! Trading cycle state machine (spec §4.6): idle -> active -> {paused,
//! stopping -> stopped, emergency_stopped} -> completed, with an
//! at-most-one-active-cycle invariant enforced by the Store Gateway.

use crate::error::{AppError, AppResult};
use crate::models::{CycleMode, CycleStatus, TradingCycle};
use crate::store::StoreGateway;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CycleEngine {
    store: Arc<StoreGateway>,
}

/// `cycle_{YYYYMMDD_HHMMSS}` — kept from the original system (SPEC_FULL §11)
/// rather than a UUID, so cycle ids stay human-sortable in logs.
fn new_cycle_id() -> String {
    format!("cycle_{}", Utc::now().format("%Y%m%d_%H%M%S"))
}

impl CycleEngine {
    pub fn new(store: Arc<StoreGateway>) -> Self {
        Self { store }
    }

    pub async fn start(
        &self,
        mode: CycleMode,
        scan_cadence_secs: u32,
        max_positions: u32,
        risk_level: f64,
    ) -> AppResult<TradingCycle> {
        if let Some(active) = self.store.load_active().await? {
            return Err(AppError::DataIntegrity(format!(
                "cycle {} is already active, stop it before starting a new one",
                active.id
            )));
        }
        let cycle = TradingCycle::new(new_cycle_id(), mode, scan_cadence_secs, max_positions, risk_level);
        self.store.create_cycle(&cycle).await?;
        info!(cycle_id = %cycle.id, ?mode, "cycle started");
        Ok(cycle)
    }

    pub async fn pause(&self, cycle_id: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(cycle_id, &[CycleStatus::Active], CycleStatus::Paused, None)
            .await?;
        info!(cycle_id, "cycle paused");
        Ok(())
    }

    pub async fn resume(&self, cycle_id: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(cycle_id, &[CycleStatus::Paused], CycleStatus::Active, None)
            .await?;
        info!(cycle_id, "cycle resumed");
        Ok(())
    }

    /// Requests a graceful stop: the in-flight scan tick (if any) finishes
    /// and no new ticks run; open positions are left to the ordinary
    /// mark-to-market/exit path, not force-liquidated.
    pub async fn request_stop(&self, cycle_id: &str, reason: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(
                cycle_id,
                &[CycleStatus::Active, CycleStatus::Paused],
                CycleStatus::Stopping,
                Some(reason),
            )
            .await?;
        info!(cycle_id, reason, "cycle stop requested");
        Ok(())
    }

    pub async fn finalize_stop(&self, cycle_id: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(cycle_id, &[CycleStatus::Stopping], CycleStatus::Stopped, None)
            .await?;
        info!(cycle_id, "cycle stopped");
        Ok(())
    }

    /// Bypasses the graceful `stopping` phase entirely — used when the
    /// position coordinator's emergency liquidation deadline expires or an
    /// operator calls the emergency-stop endpoint.
    pub async fn emergency_stop(&self, cycle_id: &str, reason: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(
                cycle_id,
                &[CycleStatus::Active, CycleStatus::Paused, CycleStatus::Stopping],
                CycleStatus::EmergencyStopped,
                Some(reason),
            )
            .await?;
        warn!(cycle_id, reason, "cycle emergency-stopped");
        Ok(())
    }

    pub async fn complete(&self, cycle_id: &str) -> AppResult<()> {
        self.store
            .transition_cycle_status(
                cycle_id,
                &[CycleStatus::Stopped, CycleStatus::EmergencyStopped],
                CycleStatus::Completed,
                None,
            )
            .await?;
        info!(cycle_id, "cycle completed");
        Ok(())
    }

    pub async fn active(&self) -> AppResult<Option<TradingCycle>> {
        self.store.load_active().await
    }

    pub async fn get(&self, cycle_id: &str) -> AppResult<TradingCycle> {
        self.store.get_cycle(cycle_id).await
    }
}
