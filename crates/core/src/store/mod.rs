//! Data store collaborator
//!
//! ## Table of Contents
//! - **DataStore**: async trait the engines are written against
//! - **MemoryStore**: in-process implementation (tests, embedding)
//!
//! Atomicity expectations on implementors:
//! - `save_supplier_risk` replaces the risk fields, returns the level it
//!   replaced, and writes the escalation alert in one step. Either all of it
//!   lands or none of it does, so a transition into HIGH is never recorded
//!   without its alert.
//! - `create_alert` refuses a second open alert for the same
//!   `(entity_type, entity_id, alert_type)` with `DuplicateOpenAlert`.
//! - `resolve_alert` only flips open alerts; `resolved_at` is written once.

mod memory;
#[cfg(test)]
pub(crate) mod scripted;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::alerts::RaiseOutcome;
use crate::error::Result;
use crate::model::{
    Alert, AlertType, EntityType, Inventory, NewAlert, NewInventory, NewProduct, NewShipment,
    NewSupplier, NewWarehouse, Product, RiskLevel, Shipment, ShipmentEvent, ShipmentListing,
    ShipmentUpdate, Supplier, SupplierMetrics, SupplierRisk, Warehouse,
};

/// What `save_supplier_risk` wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRisk {
    /// Level stored before this save, `None` if risk was never computed.
    pub previous_level: Option<RiskLevel>,
    /// Escalation alert created by the save, or the open one it matched.
    /// `None` unless the save moved the supplier into HIGH.
    pub escalation: Option<RaiseOutcome>,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Liveness check for the health endpoint
    async fn ping(&self) -> Result<()>;

    // Suppliers
    async fn get_supplier(&self, id: i64) -> Result<Option<Supplier>>;
    async fn list_suppliers(&self) -> Result<Vec<Supplier>>;
    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier>;
    /// Replaces name/contact/rating. Risk fields are untouched.
    async fn update_supplier(&self, id: i64, supplier: &NewSupplier) -> Result<Supplier>;
    async fn list_shipments_for_supplier(&self, id: i64) -> Result<Vec<Shipment>>;
    /// Persist a risk computation and append a metrics row.
    ///
    /// When `escalation` is given and the replaced level was not HIGH, the
    /// alert is raised (deduplicated against open alerts) in the same atomic
    /// step, stamped with `risk.computed_at`. On error nothing is written.
    async fn save_supplier_risk(
        &self,
        id: i64,
        risk: &SupplierRisk,
        escalation: Option<&NewAlert>,
    ) -> Result<SavedRisk>;
    /// Most recent first, at most `limit` rows.
    async fn list_supplier_metrics(&self, id: i64, limit: u32) -> Result<Vec<SupplierMetrics>>;

    // Catalog
    async fn list_products(&self) -> Result<Vec<Product>>;
    async fn create_product(&self, product: &NewProduct) -> Result<Product>;
    async fn list_warehouses(&self) -> Result<Vec<Warehouse>>;
    async fn create_warehouse(&self, warehouse: &NewWarehouse) -> Result<Warehouse>;
    async fn list_inventory(&self) -> Result<Vec<Inventory>>;
    /// Insert or replace the row for (product, warehouse).
    async fn upsert_inventory(&self, inventory: &NewInventory) -> Result<Inventory>;

    // Shipments
    async fn get_shipment(&self, id: i64) -> Result<Option<Shipment>>;
    /// Joined with supplier/product/warehouse names, newest ship date first.
    async fn list_shipments(&self) -> Result<Vec<ShipmentListing>>;
    /// Also records a `CREATED` shipment event.
    async fn create_shipment(&self, shipment: &NewShipment) -> Result<Shipment>;
    /// Also records an event when the status changes.
    async fn update_shipment(&self, id: i64, update: &ShipmentUpdate) -> Result<Shipment>;
    async fn list_shipment_events(&self, id: i64) -> Result<Vec<ShipmentEvent>>;

    // Alerts
    async fn create_alert(&self, alert: &NewAlert, created_at: DateTime<Utc>) -> Result<Alert>;
    async fn find_open_alert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<Alert>>;
    /// Fails with `NotFound` or `AlreadyResolved`.
    async fn resolve_alert(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<Alert>;
    /// Newest first.
    async fn list_alerts(&self, resolved: bool) -> Result<Vec<Alert>>;

    // Counters
    async fn count_suppliers(&self) -> Result<i64>;
    async fn count_in_transit_shipments(&self) -> Result<i64>;
    async fn count_open_alerts(&self) -> Result<i64>;
    /// Inventory rows below safety stock.
    async fn count_critical_inventory(&self) -> Result<i64>;
}
