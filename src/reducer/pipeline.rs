//! Candidate reducer pipeline (spec §4.5): Universe -> Catalyst ->
//! Technical -> Risk -> Selection, run once per scan tick.

use crate::client::ServiceClient;
use crate::error::AppResult;
use crate::models::{CycleMode, ScanResult};
use crate::reducer::{catalyst_stage, risk_stage, selection, technical_stage, universe};
use crate::store::StoreGateway;
use chrono::Utc;
use tracing::info;

pub struct ReducerPipeline {
    client: std::sync::Arc<ServiceClient>,
    store: std::sync::Arc<StoreGateway>,
    fanout: usize,
}

impl ReducerPipeline {
    pub fn new(client: std::sync::Arc<ServiceClient>, store: std::sync::Arc<StoreGateway>, fanout: usize) -> Self {
        Self { client, store, fanout }
    }

    pub async fn run(
        &self,
        cycle_id: &str,
        slots_available: usize,
        mode: CycleMode,
        risk_level: f64,
    ) -> AppResult<Vec<ScanResult>> {
        if slots_available == 0 {
            info!(cycle_id, "no open slots, skipping scan tick");
            return Ok(Vec::new());
        }

        let started = Utc::now();
        let universe = universe::fetch_universe(&self.client).await?;
        info!(cycle_id, count = universe.len(), "stage 1 (universe) complete");

        let after_catalyst = catalyst_stage::score_and_filter(&self.store, universe)
            .await
            .map_err(crate::error::AppError::Internal)?;
        info!(cycle_id, count = after_catalyst.len(), "stage 2 (catalyst) complete");

        let after_technical =
            technical_stage::score_and_filter(&self.client, &self.store, cycle_id, after_catalyst, self.fanout).await;
        info!(cycle_id, count = after_technical.len(), "stage 3 (technical) complete");

        let effective = self.store.effective_risk_parameters(Utc::now()).await?;
        let after_risk = risk_stage::validate_and_filter(
            &self.client,
            &self.store,
            cycle_id,
            after_technical,
            mode,
            risk_level,
            &effective,
        )
        .await;
        info!(cycle_id, count = after_risk.len(), "stage 4 (risk) complete");

        let results =
            selection::select_and_persist(&self.store, cycle_id, after_risk, slots_available, &effective)
                .await
                .map_err(crate::error::AppError::Internal)?;
        info!(
            cycle_id,
            selected = results.iter().filter(|r| r.selected).count(),
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "stage 5 (selection) complete"
        );

        Ok(results)
    }
}
