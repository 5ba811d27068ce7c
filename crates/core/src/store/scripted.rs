//! `MemoryStore` wrapper with injectable misbehaviour for engine tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{DataStore, MemoryStore, SavedRisk};
use crate::error::{CoreError, Result};
use crate::model::{
    Alert, AlertType, EntityType, Inventory, NewAlert, NewInventory, NewProduct, NewShipment,
    NewSupplier, NewWarehouse, Product, Shipment, ShipmentEvent, ShipmentListing, ShipmentUpdate,
    Supplier, SupplierMetrics, SupplierRisk, Warehouse,
};

#[derive(Default)]
pub struct ScriptedStore {
    inner: MemoryStore,
    /// Saves that fail with `StoreUnavailable` before touching `inner`.
    failing_saves: AtomicUsize,
    /// Lookups that report no open alert, as if another writer had not
    /// committed yet.
    stale_lookups: AtomicUsize,
}

impl ScriptedStore {
    pub fn wrapping(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn fail_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    pub fn stale_lookups(&self, n: usize) {
        self.stale_lookups.store(n, Ordering::SeqCst);
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DataStore for ScriptedStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn get_supplier(&self, id: i64) -> Result<Option<Supplier>> {
        self.inner.get_supplier(id).await
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        self.inner.list_suppliers().await
    }

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        self.inner.create_supplier(supplier).await
    }

    async fn update_supplier(&self, id: i64, supplier: &NewSupplier) -> Result<Supplier> {
        self.inner.update_supplier(id, supplier).await
    }

    async fn list_shipments_for_supplier(&self, id: i64) -> Result<Vec<Shipment>> {
        self.inner.list_shipments_for_supplier(id).await
    }

    async fn save_supplier_risk(
        &self,
        id: i64,
        risk: &SupplierRisk,
        escalation: Option<&NewAlert>,
    ) -> Result<SavedRisk> {
        if Self::take(&self.failing_saves) {
            return Err(CoreError::store("alerts table unavailable"));
        }
        self.inner.save_supplier_risk(id, risk, escalation).await
    }

    async fn list_supplier_metrics(&self, id: i64, limit: u32) -> Result<Vec<SupplierMetrics>> {
        self.inner.list_supplier_metrics(id, limit).await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        self.inner.create_product(product).await
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        self.inner.list_warehouses().await
    }

    async fn create_warehouse(&self, warehouse: &NewWarehouse) -> Result<Warehouse> {
        self.inner.create_warehouse(warehouse).await
    }

    async fn list_inventory(&self) -> Result<Vec<Inventory>> {
        self.inner.list_inventory().await
    }

    async fn upsert_inventory(&self, inventory: &NewInventory) -> Result<Inventory> {
        self.inner.upsert_inventory(inventory).await
    }

    async fn get_shipment(&self, id: i64) -> Result<Option<Shipment>> {
        self.inner.get_shipment(id).await
    }

    async fn list_shipments(&self) -> Result<Vec<ShipmentListing>> {
        self.inner.list_shipments().await
    }

    async fn create_shipment(&self, shipment: &NewShipment) -> Result<Shipment> {
        self.inner.create_shipment(shipment).await
    }

    async fn update_shipment(&self, id: i64, update: &ShipmentUpdate) -> Result<Shipment> {
        self.inner.update_shipment(id, update).await
    }

    async fn list_shipment_events(&self, id: i64) -> Result<Vec<ShipmentEvent>> {
        self.inner.list_shipment_events(id).await
    }

    async fn create_alert(&self, alert: &NewAlert, created_at: DateTime<Utc>) -> Result<Alert> {
        self.inner.create_alert(alert, created_at).await
    }

    async fn find_open_alert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<Alert>> {
        if Self::take(&self.stale_lookups) {
            return Ok(None);
        }
        self.inner
            .find_open_alert(entity_type, entity_id, alert_type)
            .await
    }

    async fn resolve_alert(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<Alert> {
        self.inner.resolve_alert(id, resolved_at).await
    }

    async fn list_alerts(&self, resolved: bool) -> Result<Vec<Alert>> {
        self.inner.list_alerts(resolved).await
    }

    async fn count_suppliers(&self) -> Result<i64> {
        self.inner.count_suppliers().await
    }

    async fn count_in_transit_shipments(&self) -> Result<i64> {
        self.inner.count_in_transit_shipments().await
    }

    async fn count_open_alerts(&self) -> Result<i64> {
        self.inner.count_open_alerts().await
    }

    async fn count_critical_inventory(&self) -> Result<i64> {
        self.inner.count_critical_inventory().await
    }
}
