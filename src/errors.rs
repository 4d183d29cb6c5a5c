use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt::Display;
use thiserror::Error;

/// Failure of a single analyzer call against the metered provider.
///
/// Always treated as one failed unit of work; retries are a next-cycle
/// concern, never handled inside the call itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyzerError {
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("provider response decode failed: {0}")]
    Decode(String),
}

/// Outcome of a call routed through the circuit breaker.
///
/// `Open` must stay distinguishable from `Upstream` so callers can fall
/// back to cached data without charging the budget.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerError<E: Display> {
    #[error("circuit breaker open, retry in {retry_in_ms}ms")]
    Open { retry_in_ms: u64 },
    #[error("upstream call failed: {0}")]
    Upstream(E),
}

/// Failure kinds surfaced to administrative fetch callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request budget exhausted")]
    BudgetExhausted,
    #[error("circuit breaker open, retry in {retry_in_ms}ms")]
    BreakerOpen { retry_in_ms: u64 },
    #[error("upstream failure: {0}")]
    Upstream(#[from] AnalyzerError),
    #[error("a refresh cycle is already running")]
    Busy,
}

/// A batch job rejected as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BatchError {
    pub message: String,
}

impl BatchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn budget_exhausted_response() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": "BUDGET_EXHAUSTED",
            "message": "monthly or daily request budget exhausted"
        })),
    )
        .into_response()
}

pub fn breaker_open_response(retry_in_ms: u64) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "BREAKER_OPEN",
            "message": "provider circuit breaker is open",
            "retryInMs": retry_in_ms
        })),
    )
        .into_response()
}

pub fn upstream_error_response(message: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": "UPSTREAM_ERROR",
            "message": message
        })),
    )
        .into_response()
}

pub fn refresh_in_progress_response() -> Response {
    (
        StatusCode::CONFLICT,
        Json(json!({
            "error": "REFRESH_IN_PROGRESS",
            "message": "a refresh cycle is already running"
        })),
    )
        .into_response()
}

pub fn wallet_not_found_response(address: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "WALLET_NOT_FOUND",
            "message": format!("provider reports nothing interesting for {address}")
        })),
    )
        .into_response()
}

pub fn cycle_failed_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "CYCLE_FAILED",
            "message": message
        })),
    )
        .into_response()
}
