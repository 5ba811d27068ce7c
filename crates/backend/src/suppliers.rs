// =============================================================================
// SCRI Backend - Suppliers API
// =============================================================================
// Supplier CRUD, metrics history and on-demand risk computation
// =============================================================================

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use scri_core::model::{NewSupplier, RiskLevel, Supplier, SupplierMetrics};
use scri_core::risk::RiskAssessment;
use scri_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{non_blank, optional_f64, ApiJson, ApiPath, ApiResponse, ApiResult, Numeric};
use crate::AppState;

/// Rows returned by the metrics history endpoint.
const METRICS_HISTORY_LIMIT: u32 = 30;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SupplierRequest {
    pub name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<Numeric>,
}

impl SupplierRequest {
    fn into_new(self) -> Result<NewSupplier, ApiError> {
        let supplier = NewSupplier {
            name: self.name.unwrap_or_default().trim().to_string(),
            contact_email: non_blank(self.contact_email),
            phone: non_blank(self.phone),
            rating: optional_f64("rating", self.rating.as_ref())?.unwrap_or(0.0),
        };
        supplier.validate()?;
        Ok(supplier)
    }
}

/// Supplier as listed. A supplier whose risk was never computed shows
/// score 0 and level LOW.
#[derive(Debug, Serialize)]
pub struct SupplierResponse {
    pub supplier_id: i64,
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub on_time_rate: Option<f64>,
    pub avg_delay_days: Option<f64>,
    pub risk_computed_at: Option<DateTime<Utc>>,
}

impl From<Supplier> for SupplierResponse {
    fn from(s: Supplier) -> Self {
        let risk = s.risk.as_ref();
        Self {
            supplier_id: s.supplier_id,
            risk_score: risk.map_or(0.0, |r| r.risk_score),
            risk_level: risk.map_or(RiskLevel::Low, |r| r.risk_level),
            on_time_rate: risk.map(|r| r.on_time_rate),
            avg_delay_days: risk.map(|r| r.avg_delay_days),
            risk_computed_at: risk.map(|r| r.computed_at),
            name: s.name,
            contact_email: s.contact_email,
            phone: s.phone,
            rating: s.rating,
            created_at: s.created_at,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list_suppliers(State(state): State<AppState>) -> ApiResult<Vec<SupplierResponse>> {
    let suppliers = state.store.list_suppliers().await?;
    Ok(ApiResponse::ok(
        suppliers.into_iter().map(SupplierResponse::from).collect(),
    ))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SupplierRequest>,
) -> Result<(StatusCode, ApiResponse<SupplierResponse>), ApiError> {
    let supplier = state.store.create_supplier(&req.into_new()?).await?;
    tracing::info!(supplier_id = supplier.supplier_id, "supplier created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(supplier.into()).with_message("Supplier created successfully"),
    ))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<SupplierResponse> {
    let supplier = state
        .store
        .get_supplier(id)
        .await?
        .ok_or_else(|| CoreError::not_found("supplier", id))?;
    Ok(ApiResponse::ok(supplier.into()))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<SupplierRequest>,
) -> ApiResult<SupplierResponse> {
    let supplier = state.store.update_supplier(id, &req.into_new()?).await?;
    Ok(ApiResponse::ok(supplier.into()).with_message("Supplier updated successfully"))
}

pub async fn supplier_metrics(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<SupplierMetrics>> {
    if state.store.get_supplier(id).await?.is_none() {
        return Err(CoreError::not_found("supplier", id).into());
    }
    let history = state
        .store
        .list_supplier_metrics(id, METRICS_HISTORY_LIMIT)
        .await?;
    Ok(ApiResponse::ok(history))
}

pub async fn compute_risk(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<RiskAssessment> {
    let assessment = state.risk.compute(id).await?;
    Ok(ApiResponse::ok(assessment).with_message("Risk score computed successfully"))
}
