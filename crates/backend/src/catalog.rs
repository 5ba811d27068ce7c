// =============================================================================
// SCRI Backend - Catalog API
// =============================================================================
// Warehouses, products and inventory levels
// =============================================================================

use axum::{extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use scri_core::model::{
    Inventory, InventoryStatus, NewInventory, NewProduct, NewWarehouse, Product, Warehouse,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{
    non_blank, optional_f64, optional_i64, require_i64, ApiJson, ApiResponse, ApiResult, Numeric,
};
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct WarehouseRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub supplier_id: Option<Numeric>,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit_cost: Option<Numeric>,
    pub lead_time_days: Option<Numeric>,
}

impl ProductRequest {
    fn into_new(self) -> Result<NewProduct, ApiError> {
        let product = NewProduct {
            supplier_id: require_i64("supplier_id", self.supplier_id.as_ref())?,
            name: self.name.unwrap_or_default().trim().to_string(),
            sku: non_blank(self.sku),
            category: non_blank(self.category),
            unit_cost: optional_f64("unit_cost", self.unit_cost.as_ref())?.unwrap_or(0.0),
            lead_time_days: optional_i64("lead_time_days", self.lead_time_days.as_ref())?
                .unwrap_or(0),
        };
        product.validate()?;
        Ok(product)
    }
}

#[derive(Debug, Deserialize)]
pub struct InventoryRequest {
    pub product_id: Option<Numeric>,
    pub warehouse_id: Option<Numeric>,
    pub quantity: Option<Numeric>,
    pub reorder_threshold: Option<Numeric>,
    pub safety_stock: Option<Numeric>,
}

impl InventoryRequest {
    fn into_new(self) -> Result<NewInventory, ApiError> {
        let inventory = NewInventory {
            product_id: require_i64("product_id", self.product_id.as_ref())?,
            warehouse_id: require_i64("warehouse_id", self.warehouse_id.as_ref())?,
            quantity: require_i64("quantity", self.quantity.as_ref())?,
            reorder_threshold: optional_i64("reorder_threshold", self.reorder_threshold.as_ref())?
                .unwrap_or(0),
            safety_stock: optional_i64("safety_stock", self.safety_stock.as_ref())?.unwrap_or(0),
        };
        inventory.validate()?;
        Ok(inventory)
    }
}

/// Inventory row with its derived stock status.
#[derive(Debug, Serialize)]
pub struct InventoryResponse {
    pub inventory_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub warehouse_name: Option<String>,
    pub quantity: i64,
    pub reorder_threshold: i64,
    pub safety_stock: i64,
    pub status: InventoryStatus,
    pub last_updated: DateTime<Utc>,
}

impl From<Inventory> for InventoryResponse {
    fn from(i: Inventory) -> Self {
        Self {
            status: i.status(),
            inventory_id: i.inventory_id,
            product_id: i.product_id,
            warehouse_id: i.warehouse_id,
            product_name: i.product_name,
            sku: i.sku,
            warehouse_name: i.warehouse_name,
            quantity: i.quantity,
            reorder_threshold: i.reorder_threshold,
            safety_stock: i.safety_stock,
            last_updated: i.last_updated,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn list_warehouses(State(state): State<AppState>) -> ApiResult<Vec<Warehouse>> {
    Ok(ApiResponse::ok(state.store.list_warehouses().await?))
}

pub async fn create_warehouse(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WarehouseRequest>,
) -> Result<(StatusCode, ApiResponse<Warehouse>), ApiError> {
    let warehouse = NewWarehouse {
        name: req.name.unwrap_or_default().trim().to_string(),
        location: non_blank(req.location),
    };
    warehouse.validate()?;

    let created = state.store.create_warehouse(&warehouse).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(created).with_message("Warehouse created successfully"),
    ))
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    Ok(ApiResponse::ok(state.store.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<(StatusCode, ApiResponse<Product>), ApiError> {
    let product = state.store.create_product(&req.into_new()?).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(product).with_message("Product created successfully"),
    ))
}

pub async fn list_inventory(State(state): State<AppState>) -> ApiResult<Vec<InventoryResponse>> {
    let rows = state.store.list_inventory().await?;
    Ok(ApiResponse::ok(
        rows.into_iter().map(InventoryResponse::from).collect(),
    ))
}

/// Insert or replace the level for a (product, warehouse) pair.
pub async fn upsert_inventory(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<InventoryRequest>,
) -> ApiResult<InventoryResponse> {
    let row = state.store.upsert_inventory(&req.into_new()?).await?;
    state.alerts.evaluate_inventory(&row).await?;
    Ok(ApiResponse::ok(row.into()).with_message("Inventory updated successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_request_requires_supplier() {
        let req = ProductRequest {
            supplier_id: None,
            name: Some("Bolt".into()),
            sku: None,
            category: None,
            unit_cost: None,
            lead_time_days: None,
        };
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_inventory_request_defaults_thresholds() {
        let req = InventoryRequest {
            product_id: Some(Numeric::Number(1.0)),
            warehouse_id: Some(Numeric::Text("2".into())),
            quantity: Some(Numeric::Text("15".into())),
            reorder_threshold: None,
            safety_stock: Some(Numeric::Text("".into())),
        };
        let row = req.into_new().unwrap();
        assert_eq!((row.quantity, row.reorder_threshold, row.safety_stock), (15, 0, 0));
    }

    #[test]
    fn test_inventory_request_rejects_negative() {
        let req = InventoryRequest {
            product_id: Some(Numeric::Number(1.0)),
            warehouse_id: Some(Numeric::Number(1.0)),
            quantity: Some(Numeric::Number(-1.0)),
            reorder_threshold: None,
            safety_stock: None,
        };
        assert!(matches!(req.into_new(), Err(ApiError::BadRequest(_))));
    }
}
