//! Delayed price-impact computation (spec §4.4, §11): some fixed delay
//! after publication, look up the price move that followed a news event
//! and record it. Attempts are capped; a news event that never gets a
//! price reading after `max_attempts` tries raises a risk event instead of
//! retrying forever.

use crate::client::ServiceClient;
use crate::config::Config;
use crate::models::{RiskEvent, RiskSeverity};
use crate::store::StoreGateway;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct PriceAtResponse {
    price: f64,
}

pub struct ImpactComputer {
    client: Arc<ServiceClient>,
    store: Arc<StoreGateway>,
    interval: std::time::Duration,
    delay: std::time::Duration,
    batch: usize,
    max_attempts: u32,
}

impl ImpactComputer {
    pub fn new(client: Arc<ServiceClient>, store: Arc<StoreGateway>, config: &Config) -> Self {
        Self {
            client,
            store,
            interval: config.news_impact_interval,
            delay: config.news_impact_delay,
            batch: config.news_impact_batch,
            max_attempts: config.news_impact_max_attempts,
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("starting news impact computation loop");
        let mut tick = interval(self.interval);
        loop {
            tick.tick().await;
            if let Err(e) = self.sweep_once().await {
                warn!(error = %e, "impact sweep failed");
            }
        }
    }

    pub async fn sweep_once(&self) -> anyhow::Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::from_std(self.delay)?;
        let pending = self.store.unprocessed_news(cutoff, self.max_attempts, self.batch).await?;

        let mut computed = 0;
        for event in pending {
            match self.compute_one(&event).await {
                Ok(()) => computed += 1,
                Err(e) => {
                    let attempts = self.store.increment_news_attempt(event.id).await?;
                    warn!(news_id = event.id, attempts, error = %e, "impact lookup failed");
                    if attempts >= self.max_attempts {
                        let risk_event = RiskEvent {
                            id: 0,
                            event_type: "news_impact_unresolved".into(),
                            severity: RiskSeverity::Warning,
                            cycle_id: None,
                            security_id: Some(event.security_id),
                            message: format!(
                                "news event {} never got a price reading after {attempts} attempts",
                                event.id
                            ),
                            data: serde_json::json!({"news_id": event.id, "symbol": event.symbol}),
                            created_at: Utc::now(),
                            acknowledged: false,
                            acknowledged_at: None,
                        };
                        self.store.append_risk_event(&risk_event).await?;
                    }
                }
            }
        }
        Ok(computed)
    }

    async fn compute_one(&self, event: &crate::models::NewsEvent) -> anyhow::Result<()> {
        let at_pub: PriceAtResponse = self
            .client
            .get_json("technical", &format!("/api/v1/price-at?symbol={}&at={}", event.symbol, event.published_at.to_rfc3339()))
            .await?;
        let impact_at = event.published_at + chrono::Duration::from_std(self.delay)?;
        let at_later: PriceAtResponse = self
            .client
            .get_json("technical", &format!("/api/v1/price-at?symbol={}&at={}", event.symbol, impact_at.to_rfc3339()))
            .await?;

        if at_pub.price <= 0.0 {
            anyhow::bail!("non-positive reference price for {}", event.symbol);
        }
        let pct = (at_later.price - at_pub.price) / at_pub.price * 100.0;
        self.store.update_news_impact(event.id, pct).await?;
        Ok(())
    }
}
