//! Uniform outbound caller for the five downstream services (scanner,
//! pattern, technical, risk-manager, trading) and the two non-gating ones
//! (news, reporting) — spec §4.2.
//!
//! Grounded in the teacher's `scrapers/polymarket_api.rs::execute_with_retry`
//! exponential-backoff loop, generalized from a single hardcoded API to a
//! named-service lookup, and given a circuit breaker per service the
//! teacher's single-API scraper didn't need.

use crate::client::circuit_breaker::CircuitBreakers;
use crate::config::{Config, ServiceUrls};
use crate::error::{AppError, AppResult};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

pub struct ServiceClient {
    http: Client,
    services: ServiceUrls,
    timeout: Duration,
    max_retries: u32,
    breakers: CircuitBreakers,
}

impl ServiceClient {
    pub fn new(config: &Config) -> Self {
        let http = Client::builder()
            .timeout(config.service_call_timeout)
            .user_agent("catalyst-orchestrator/1.0")
            .build()
            .expect("build reqwest client");

        Self {
            http,
            services: config.services.clone(),
            timeout: config.service_call_timeout,
            max_retries: config.service_max_retries,
            breakers: CircuitBreakers::new(config.circuit_breaker_threshold, config.circuit_breaker_cooldown),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, service: &str, path: &str) -> AppResult<T> {
        self.call(service, Method::GET, path, None::<&()>).await
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        self.call(service, Method::POST, path, Some(body)).await
    }

    /// Cheap liveness probe used by the health monitor: `GET /health`,
    /// success means any 2xx with a parseable body (or none at all).
    pub async fn probe_health(&self, service: &str) -> AppResult<Value> {
        self.get_json(service, "/health").await
    }

    async fn call<B: Serialize, T: DeserializeOwned>(
        &self,
        service: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> AppResult<T> {
        if self.breakers.is_open(service) {
            return Err(AppError::ServiceUnavailable {
                service: service.to_string(),
                reason: "circuit open".into(),
            });
        }

        let base = self.services.resolve(service).ok_or_else(|| {
            AppError::Validation(format!("unknown downstream service: {service}"))
        })?;
        let url = format!("{base}{path}");

        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 0..self.max_retries.max(1) {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(b) = body {
                request = request.json(b);
            }

            let outcome = tokio::time::timeout(self.timeout, request.send()).await;

            match outcome {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        self.breakers.record_success(service);
                        return response.json::<T>().await.map_err(|e| {
                            AppError::Internal(anyhow::anyhow!(
                                "{service}: protocol error decoding response: {e}"
                            ))
                        });
                    }
                    if status.is_client_error() {
                        // Invalid request — not retried, not a breaker trip.
                        let text = response.text().await.unwrap_or_default();
                        return Err(AppError::Validation(format!(
                            "{service} rejected request ({status}): {text}"
                        )));
                    }
                    warn!(service, %status, attempt, "downstream returned server error");
                    last_err = Some(format!("{status}"));
                }
                Ok(Err(e)) => {
                    warn!(service, attempt, error = %e, "downstream request failed");
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!(service, attempt, timeout_secs = self.timeout.as_secs(), "downstream call timed out");
                    last_err = Some("timeout".into());
                }
            }

            if attempt + 1 < self.max_retries {
                debug!(service, backoff_ms = backoff.as_millis(), "retrying after backoff");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(Duration::from_secs(10));
            }
        }

        let tripped = self.breakers.record_failure(service);
        if tripped {
            warn!(service, "circuit breaker tripped open");
        }
        Err(AppError::ServiceUnavailable {
            service: service.to_string(),
            reason: last_err.unwrap_or_else(|| "exhausted retries".into()),
        })
    }

    /// Treats a 4xx/5xx the same as a transport failure — used for the
    /// broker call path (spec §4.7), where a rejected order must surface as
    /// `BrokerFailure`, not `ServiceUnavailable`.
    pub async fn call_broker<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let base = self
            .services
            .resolve("trading")
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("trading service not configured")))?;
        let url = format!("{base}{path}");

        let response = tokio::time::timeout(self.timeout, self.http.post(&url).json(body).send())
            .await
            .map_err(|_| AppError::BrokerFailure("order submission timed out".into()))?
            .map_err(|e| AppError::BrokerFailure(e.to_string()))?;

        if response.status() == StatusCode::OK || response.status() == StatusCode::CREATED {
            response
                .json::<T>()
                .await
                .map_err(|e| AppError::BrokerFailure(format!("malformed broker response: {e}")))
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(AppError::BrokerFailure(format!("broker rejected order ({status}): {text}")))
        }
    }
}
