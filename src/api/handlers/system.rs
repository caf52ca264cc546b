//! System endpoints: health check and accounting configuration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Effective accounting configuration.
#[derive(Debug, Serialize, ToSchema)]
struct AccountingConfig {
    warning_thresholds: Vec<i64>,
    usage_notices_enabled: bool,
    authority_configured: bool,
    persistence_enabled: bool,
    snapshot_interval_secs: u64,
    reconcile_interval_secs: u64,
}

/// `GET /config/accounting` — Effective accounting configuration.
#[utoipa::path(
    get,
    path = "/config/accounting",
    tag = "System",
    summary = "Show accounting configuration",
    description = "Returns the warning threshold schedule and the feature switches the service is running with.",
    responses(
        (status = 200, description = "Accounting configuration", body = AccountingConfig),
    )
)]
pub async fn accounting_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    (
        StatusCode::OK,
        Json(AccountingConfig {
            warning_thresholds: config.warning_thresholds.levels().to_vec(),
            usage_notices_enabled: config.usage_notices_enabled,
            authority_configured: config.authority_api_url.is_some(),
            persistence_enabled: config.persistence_enabled,
            snapshot_interval_secs: config.snapshot_interval_secs,
            reconcile_interval_secs: config.reconcile_interval_secs,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/accounting", get(accounting_config_handler))
}
