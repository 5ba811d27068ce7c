// =============================================================================
// SCRI Backend - Dashboard API
// =============================================================================
// Read-only views polled by the dashboard, plus the health check
// =============================================================================

use axum::extract::State;
use scri_core::aggregate::{DashboardMetrics, ShipmentView, SupplierRiskRow};
use serde::Serialize;

use crate::response::{ApiResponse, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Always answers; a failed ping only flips `database`.
pub async fn health(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!("Health check ping failed: {}", e);
            "disconnected"
        }
    };
    ApiResponse::ok(HealthResponse {
        status: "ok",
        database,
    })
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<DashboardMetrics> {
    Ok(ApiResponse::ok(state.dashboard.metrics().await?))
}

pub async fn supplier_risk(State(state): State<AppState>) -> ApiResult<Vec<SupplierRiskRow>> {
    Ok(ApiResponse::ok(state.dashboard.supplier_risk().await?))
}

pub async fn delayed_shipments(State(state): State<AppState>) -> ApiResult<Vec<ShipmentView>> {
    Ok(ApiResponse::ok(state.dashboard.delayed_shipments().await?))
}
