//! Periodic mark-to-market (spec §4.7): batched live-price fetch for every
//! open position in a cycle, folded into one bulk unrealized-P&L update.

use crate::client::ServiceClient;
use crate::store::StoreGateway;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    quotes: HashMap<String, f64>,
}

pub struct MarkToMarket {
    client: Arc<ServiceClient>,
    store: Arc<StoreGateway>,
}

impl MarkToMarket {
    pub fn new(client: Arc<ServiceClient>, store: Arc<StoreGateway>) -> Self {
        Self { client, store }
    }

    pub async fn run_once(&self, cycle_id: &str) -> anyhow::Result<usize> {
        let positions = self.store.list_open_positions(cycle_id).await?;
        if positions.is_empty() {
            return Ok(0);
        }

        let symbols: Vec<&str> = positions.iter().map(|p| p.symbol.as_str()).collect();
        let query = symbols.join(",");
        let quotes: QuoteResponse = match self
            .client
            .get_json("technical", &format!("/api/v1/quotes?symbols={query}"))
            .await
        {
            Ok(q) => q,
            Err(e) => {
                warn!(cycle_id, error = %e, "mark-to-market quote fetch failed, skipping this tick");
                return Ok(0);
            }
        };

        let mut updates = Vec::with_capacity(positions.len());
        for position in &positions {
            let Some(price) = quotes.quotes.get(&position.symbol) else { continue };
            let pnl = position.unrealized_pnl_at(*price);
            updates.push((position.id.clone(), pnl, pnl, pnl));
        }

        let count = updates.len();
        self.store.update_unrealized_pnl_bulk(&updates).await?;
        Ok(count)
    }
}
