use crate::errors::{
    breaker_open_response, budget_exhausted_response, cycle_failed_response,
    refresh_in_progress_response, upstream_error_response, wallet_not_found_response, FetchError,
};
use crate::metrics::Metrics;
use crate::model::WalletProfile;
use crate::scheduler::{AdaptiveScheduler, CycleOutcome};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    scheduler: Arc<AdaptiveScheduler>,
    metrics: Arc<Metrics>,
}

pub fn build_app(scheduler: Arc<AdaptiveScheduler>, metrics: Arc<Metrics>) -> Router {
    let state = AppState { scheduler, metrics };
    Router::new()
        .route("/health", get(health))
        .route("/v1/status", get(status))
        .route("/v1/wallets", get(wallets))
        .route("/v1/refresh", post(refresh))
        .route("/v1/wallets/{address}/refresh", post(refresh_wallet))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({"status": "UP"}))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let scheduler = &state.scheduler;
    Json(json!({
        "ledger": scheduler.ledger_snapshot(),
        "breaker": scheduler.breaker_state(),
        "cacheEntries": scheduler.cache_size(),
        "trackedWallets": scheduler.tracked_len(),
        "metrics": state.metrics.snapshot(),
    }))
}

async fn wallets(State(state): State<AppState>) -> Json<Vec<WalletProfile>> {
    Json(state.scheduler.tracked_wallets())
}

async fn refresh(State(state): State<AppState>) -> Response {
    match state.scheduler.run_manual_cycle().await {
        CycleOutcome::Completed(summary) => (
            StatusCode::OK,
            Json(json!({"status": "COMPLETED", "summary": summary})),
        )
            .into_response(),
        CycleOutcome::SkippedBudget => budget_exhausted_response(),
        CycleOutcome::SkippedRunning => refresh_in_progress_response(),
        CycleOutcome::Failed(message) => cycle_failed_response(&message),
    }
}

async fn refresh_wallet(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Response {
    match state.scheduler.fetch_one(&address).await {
        Ok(Some(profile)) => (StatusCode::OK, Json(profile)).into_response(),
        Ok(None) => wallet_not_found_response(&address),
        Err(FetchError::Busy) => refresh_in_progress_response(),
        Err(FetchError::BudgetExhausted) => budget_exhausted_response(),
        Err(FetchError::BreakerOpen { retry_in_ms }) => breaker_open_response(retry_in_ms),
        Err(FetchError::Upstream(err)) => upstream_error_response(&err.to_string()),
    }
}
