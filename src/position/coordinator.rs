//! Position coordinator (spec §4.7): turns a selected candidate into a
//! broker order, opens the position on fill, watches stop-loss/take-profit
//! crosses for graceful exits, and performs bounded emergency liquidation.

use crate::client::ServiceClient;
use crate::error::{AppError, AppResult};
use crate::models::{CycleMode, Order, OrderSide, OrderStatus, OrderType, Position, PositionSide, PositionStatus, ScanResult, RiskEvent, RiskSeverity};
use crate::position::sizing;
use crate::store::StoreGateway;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Serialize)]
struct BrokerOrderRequest<'a> {
    symbol: &'a str,
    side: &'a str,
    order_type: &'a str,
    quantity: f64,
}

#[derive(Debug, Deserialize)]
struct BrokerOrderResponse {
    status: String,
    fill_price: Option<f64>,
    fill_quantity: Option<f64>,
    fees: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AtrResponse {
    atr: f64,
}

pub struct PositionCoordinator {
    client: Arc<ServiceClient>,
    store: Arc<StoreGateway>,
}

impl PositionCoordinator {
    pub fn new(client: Arc<ServiceClient>, store: Arc<StoreGateway>) -> Self {
        Self { client, store }
    }

    /// Submits an entry order for `candidate` and opens a position on fill.
    /// A rejected or partially-unfillable order records the order row with
    /// its terminal status and returns without opening a position.
    pub async fn open_from_candidate(
        &self,
        cycle_id: &str,
        mode: CycleMode,
        risk_level: f64,
        candidate: &ScanResult,
    ) -> AppResult<Option<Position>> {
        let quantity = sizing::quantity_for(mode, risk_level, candidate.price);
        if quantity <= 0.0 {
            return Ok(None);
        }

        let order_id = Uuid::new_v4().to_string();
        let order = Order {
            id: order_id.clone(),
            cycle_id: cycle_id.to_string(),
            security_id: candidate.security_id,
            symbol: candidate.symbol.clone(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity,
            limit_price: None,
            stop_price: None,
            time_in_force: crate::models::TimeInForce::Day,
            status: OrderStatus::Pending,
            submitted_at: None,
            fill_price: None,
            fill_quantity: None,
            fees: 0.0,
            reject_reason: None,
            position_id: None,
        };
        self.store.insert_order(&order).await?;

        let request = BrokerOrderRequest {
            symbol: &candidate.symbol,
            side: "buy",
            order_type: "market",
            quantity,
        };
        let response = match self.client.call_broker::<_, BrokerOrderResponse>("/api/v1/orders", &request).await {
            Ok(r) => r,
            Err(e) => {
                self.store
                    .update_order_status(&order_id, OrderStatus::Rejected, None, None, None, Some(&e.to_string()))
                    .await?;
                let event = RiskEvent {
                    id: 0,
                    event_type: "broker_entry_failed".into(),
                    severity: RiskSeverity::Warning,
                    cycle_id: Some(cycle_id.to_string()),
                    security_id: Some(candidate.security_id),
                    message: format!("{}: broker entry order failed, candidate dropped", candidate.symbol),
                    data: json!({"symbol": candidate.symbol, "error": e.to_string()}),
                    created_at: Utc::now(),
                    acknowledged: false,
                    acknowledged_at: None,
                };
                if let Err(log_err) = self.store.append_risk_event(&event).await {
                    warn!(symbol = %candidate.symbol, error = %log_err, "failed to record broker-entry-failed risk event");
                }
                return Err(e);
            }
        };

        if response.status != "filled" || response.fill_price.is_none() {
            self.store
                .update_order_status(&order_id, OrderStatus::Rejected, None, None, None, Some(&response.status))
                .await?;
            return Ok(None);
        }

        let fill_price = response.fill_price.unwrap();
        let fill_quantity = response.fill_quantity.unwrap_or(quantity);
        self.store
            .update_order_status(&order_id, OrderStatus::Filled, Some(fill_price), Some(fill_quantity), response.fees, None)
            .await?;

        let atr = self
            .client
            .get_json::<AtrResponse>("technical", &format!("/api/v1/atr?symbol={}", candidate.symbol))
            .await
            .map(|r| r.atr)
            .unwrap_or(fill_price * 0.02);

        let stop_loss = sizing::stop_loss_for(fill_price, atr, true);
        let take_profit = sizing::take_profit_for(fill_price, stop_loss, true);

        let position = Position {
            id: Uuid::new_v4().to_string(),
            cycle_id: cycle_id.to_string(),
            security_id: candidate.security_id,
            symbol: candidate.symbol.clone(),
            side: PositionSide::Long,
            quantity: fill_quantity,
            entry_price: fill_price,
            exit_price: None,
            stop_loss,
            take_profit,
            status: PositionStatus::Open,
            opened_at: Utc::now(),
            closed_at: None,
            realized_pnl: 0.0,
            unrealized_pnl: 0.0,
            mfe: 0.0,
            mae: 0.0,
            close_reason: None,
            entry_order_id: order_id,
            exit_order_id: None,
        };
        self.store.open_position(&position).await?;
        info!(cycle_id, symbol = %position.symbol, fill_price, "position opened");
        Ok(Some(position))
    }

    /// Checks one position's current price against its stop-loss/take-profit
    /// and closes it with a market order if either is crossed.
    pub async fn evaluate_exit(&self, position: &Position, current_price: f64) -> AppResult<bool> {
        let hit_stop = current_price <= position.stop_loss;
        let hit_target = current_price >= position.take_profit;
        if !hit_stop && !hit_target {
            return Ok(false);
        }
        let reason = if hit_stop { "stop_loss" } else { "take_profit" };
        self.close_position(position, current_price, reason).await?;
        Ok(true)
    }

    async fn close_position(&self, position: &Position, exit_price: f64, reason: &str) -> AppResult<()> {
        let order_id = Uuid::new_v4().to_string();
        let exit_order = Order {
            id: order_id.clone(),
            cycle_id: position.cycle_id.clone(),
            security_id: position.security_id,
            symbol: position.symbol.clone(),
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            quantity: position.quantity,
            limit_price: None,
            stop_price: None,
            time_in_force: crate::models::TimeInForce::Day,
            status: OrderStatus::Pending,
            submitted_at: None,
            fill_price: None,
            fill_quantity: None,
            fees: 0.0,
            reject_reason: None,
            position_id: Some(position.id.clone()),
        };
        self.store.insert_order(&exit_order).await?;

        let request = BrokerOrderRequest {
            symbol: &position.symbol,
            side: "sell",
            order_type: "market",
            quantity: position.quantity,
        };
        let response = self.client.call_broker::<_, BrokerOrderResponse>("/api/v1/orders", &request).await?;
        let fill_price = response.fill_price.unwrap_or(exit_price);

        self.store
            .update_order_status(&order_id, OrderStatus::Filled, Some(fill_price), response.fill_quantity, response.fees, None)
            .await?;

        let realized_pnl = position.unrealized_pnl_at(fill_price);
        self.store
            .close_position(&position.id, &order_id, fill_price, realized_pnl, reason)
            .await?;
        info!(position_id = %position.id, reason, realized_pnl, "position closed");
        Ok(())
    }

    /// Liquidates every open position in `cycle_id` concurrently, bounded by
    /// `deadline`. Positions still unresolved when the deadline expires are
    /// recorded as a risk event rather than retried indefinitely — an
    /// emergency stop must return control promptly.
    pub async fn emergency_liquidate(&self, cycle_id: &str, deadline: Duration) -> AppResult<usize> {
        let positions = self.store.list_open_positions(cycle_id).await?;
        let mut closed = 0;
        let mut stranded = Vec::new();

        for position in positions {
            let price = position.entry_price; // best-effort; broker fills at market
            let outcome = tokio::time::timeout(deadline, self.close_position(&position, price, "emergency_liquidation")).await;
            match outcome {
                Ok(Ok(())) => closed += 1,
                Ok(Err(e)) => {
                    warn!(position_id = %position.id, error = %e, "emergency liquidation order failed");
                    stranded.push(position.id.clone());
                }
                Err(_) => {
                    warn!(position_id = %position.id, "emergency liquidation exceeded deadline");
                    stranded.push(position.id.clone());
                }
            }
        }

        if !stranded.is_empty() {
            let event = RiskEvent {
                id: 0,
                event_type: "emergency_liquidation_incomplete".into(),
                severity: RiskSeverity::Emergency,
                cycle_id: Some(cycle_id.to_string()),
                security_id: None,
                message: format!("{} position(s) not liquidated within deadline", stranded.len()),
                data: json!({"position_ids": stranded}),
                created_at: Utc::now(),
                acknowledged: false,
                acknowledged_at: None,
            };
            self.store.append_risk_event(&event).await?;
        }

        Ok(closed)
    }
}
