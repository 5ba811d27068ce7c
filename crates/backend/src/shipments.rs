// =============================================================================
// SCRI Backend - Shipments API
// =============================================================================
// Shipment listing, creation, delivery/status updates and event history.
// Every create or update re-evaluates the shipment for a delay alert.
// =============================================================================

use axum::{extract::State, http::StatusCode};
use scri_core::aggregate::ShipmentView;
use scri_core::alerts::RaiseOutcome;
use scri_core::model::{
    Alert, NewShipment, Shipment, ShipmentEvent, ShipmentStatus, ShipmentUpdate,
};
use scri_core::CoreError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{
    optional_date, optional_i64, require_date, require_i64, ApiJson, ApiPath, ApiResponse,
    ApiResult, Numeric,
};
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub supplier_id: Option<Numeric>,
    pub product_id: Option<Numeric>,
    pub warehouse_id: Option<Numeric>,
    pub quantity: Option<Numeric>,
    pub ship_date: Option<String>,
    pub expected_arrival_date: Option<String>,
    pub status: Option<String>,
}

impl CreateShipmentRequest {
    fn into_new(self) -> Result<NewShipment, ApiError> {
        let shipment = NewShipment {
            supplier_id: require_i64("supplier_id", self.supplier_id.as_ref())?,
            product_id: require_i64("product_id", self.product_id.as_ref())?,
            warehouse_id: require_i64("warehouse_id", self.warehouse_id.as_ref())?,
            quantity: require_i64("quantity", self.quantity.as_ref())?,
            ship_date: require_date("ship_date", self.ship_date.as_deref())?,
            expected_arrival_date: require_date(
                "expected_arrival_date",
                self.expected_arrival_date.as_deref(),
            )?,
            status: parse_status(self.status.as_deref())?.unwrap_or(ShipmentStatus::Created),
        };
        shipment.validate()?;
        Ok(shipment)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateShipmentRequest {
    pub status: Option<String>,
    pub actual_arrival_date: Option<String>,
    pub expected_arrival_date: Option<String>,
    pub quantity: Option<Numeric>,
}

impl UpdateShipmentRequest {
    fn into_update(self) -> Result<ShipmentUpdate, ApiError> {
        let update = ShipmentUpdate {
            status: parse_status(self.status.as_deref())?,
            actual_arrival_date: optional_date(
                "actual_arrival_date",
                self.actual_arrival_date.as_deref(),
            )?,
            expected_arrival_date: optional_date(
                "expected_arrival_date",
                self.expected_arrival_date.as_deref(),
            )?,
            quantity: optional_i64("quantity", self.quantity.as_ref())?,
        };
        if update.is_empty() {
            return Err(ApiError::BadRequest("nothing to update".into()));
        }
        update.validate()?;
        Ok(update)
    }
}

fn parse_status(raw: Option<&str>) -> Result<Option<ShipmentStatus>, ApiError> {
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(Some(s.parse()?)),
        _ => Ok(None),
    }
}

/// A written shipment plus the delay alert it triggered, if new.
#[derive(Debug, Serialize)]
pub struct ShipmentWriteResponse {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub alert: Option<Alert>,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list_shipments(State(state): State<AppState>) -> ApiResult<Vec<ShipmentView>> {
    Ok(ApiResponse::ok(state.dashboard.shipments().await?))
}

pub async fn create_shipment(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateShipmentRequest>,
) -> Result<(StatusCode, ApiResponse<ShipmentWriteResponse>), ApiError> {
    let shipment = state.store.create_shipment(&req.into_new()?).await?;
    tracing::info!(shipment_id = shipment.shipment_id, "shipment created");

    let alert = evaluate(&state, &shipment).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(ShipmentWriteResponse { shipment, alert })
            .with_message("Shipment created successfully"),
    ))
}

pub async fn update_shipment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateShipmentRequest>,
) -> ApiResult<ShipmentWriteResponse> {
    let shipment = state.store.update_shipment(id, &req.into_update()?).await?;
    let alert = evaluate(&state, &shipment).await?;
    Ok(ApiResponse::ok(ShipmentWriteResponse { shipment, alert })
        .with_message("Shipment updated successfully"))
}

pub async fn shipment_events(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Vec<ShipmentEvent>> {
    if state.store.get_shipment(id).await?.is_none() {
        return Err(CoreError::not_found("shipment", id).into());
    }
    Ok(ApiResponse::ok(state.store.list_shipment_events(id).await?))
}

async fn evaluate(state: &AppState, shipment: &Shipment) -> Result<Option<Alert>, ApiError> {
    Ok(match state.alerts.evaluate_shipment(shipment).await? {
        Some(RaiseOutcome::Raised(alert)) => Some(alert),
        _ => None,
    })
}
