//! Crate-wide error taxonomy (spec §7).
//!
//! `AppError` is the closed set of classifications every component reacts
//! to. Anything else is a bug and propagates as `Internal` with context.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("service unavailable: {service}: {reason}")]
    ServiceUnavailable { service: String, reason: String },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("broker failure: {0}")]
    BrokerFailure(String),

    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::ServiceUnavailable { .. } | AppError::StoreUnavailable(_) => {
                Some(Duration::from_secs(5))
            }
            _ => None,
        }
    }

    pub fn classification(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::ServiceUnavailable { .. } => "service-unavailable",
            AppError::StoreUnavailable(_) => "store-unavailable",
            AppError::BrokerFailure(_) => "broker-failure",
            AppError::DataIntegrity(_) => "data-integrity",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable { .. } | AppError::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::BrokerFailure(_) | AppError::DataIntegrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "success": false,
            "classification": self.classification(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
