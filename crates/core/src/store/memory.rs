use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{DataStore, SavedRisk};
use crate::alerts::RaiseOutcome;
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, Result};
use crate::model::{
    Alert, AlertType, EntityType, Inventory, InventoryStatus, NewAlert, NewInventory, NewProduct,
    NewShipment, NewSupplier, NewWarehouse, Product, RiskLevel, Shipment, ShipmentEvent,
    ShipmentListing, ShipmentStatus, ShipmentUpdate, Supplier, SupplierMetrics, SupplierRisk,
    Warehouse,
};

#[derive(Default)]
struct Tables {
    suppliers: Vec<Supplier>,
    metrics: Vec<SupplierMetrics>,
    products: Vec<Product>,
    warehouses: Vec<Warehouse>,
    inventory: Vec<Inventory>,
    shipments: Vec<Shipment>,
    events: Vec<ShipmentEvent>,
    alerts: Vec<Alert>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn supplier_name(&self, id: i64) -> Option<String> {
        self.suppliers
            .iter()
            .find(|s| s.supplier_id == id)
            .map(|s| s.name.clone())
    }

    fn product_name(&self, id: i64) -> Option<&Product> {
        self.products.iter().find(|p| p.product_id == id)
    }

    fn warehouse_name(&self, id: i64) -> Option<String> {
        self.warehouses
            .iter()
            .find(|w| w.warehouse_id == id)
            .map(|w| w.name.clone())
    }

    fn open_alert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    ) -> Option<&Alert> {
        self.alerts.iter().find(|a| {
            a.is_open()
                && a.entity_type == entity_type
                && a.entity_id == entity_id
                && a.alert_type == alert_type
        })
    }

    fn insert_alert(&mut self, alert: &NewAlert, created_at: DateTime<Utc>) -> Alert {
        let record = Alert {
            alert_id: self.next_id(),
            alert_type: alert.alert_type,
            severity: alert.severity,
            entity_type: alert.entity_type,
            entity_id: alert.entity_id,
            message: alert.message.clone(),
            created_at,
            resolved: false,
            resolved_at: None,
        };
        self.alerts.push(record.clone());
        record
    }

    fn require_refs(&self, supplier: i64, product: i64, warehouse: i64) -> Result<()> {
        if self.supplier_name(supplier).is_none() {
            return Err(CoreError::not_found("supplier", supplier));
        }
        if self.product_name(product).is_none() {
            return Err(CoreError::not_found("product", product));
        }
        if self.warehouse_name(warehouse).is_none() {
            return Err(CoreError::not_found("warehouse", warehouse));
        }
        Ok(())
    }
}

/// In-memory `DataStore`.
///
/// All tables sit behind one mutex, so every trait method is atomic with
/// respect to every other. The lock is never held across an await.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose record timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn get_supplier(&self, id: i64) -> Result<Option<Supplier>> {
        let tables = self.tables.lock();
        Ok(tables.suppliers.iter().find(|s| s.supplier_id == id).cloned())
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        Ok(self.tables.lock().suppliers.clone())
    }

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        let mut tables = self.tables.lock();
        let record = Supplier {
            supplier_id: tables.next_id(),
            name: supplier.name.clone(),
            contact_email: supplier.contact_email.clone(),
            phone: supplier.phone.clone(),
            rating: supplier.rating,
            created_at: self.clock.now(),
            risk: None,
        };
        tables.suppliers.push(record.clone());
        Ok(record)
    }

    async fn update_supplier(&self, id: i64, supplier: &NewSupplier) -> Result<Supplier> {
        let mut tables = self.tables.lock();
        let record = tables
            .suppliers
            .iter_mut()
            .find(|s| s.supplier_id == id)
            .ok_or_else(|| CoreError::not_found("supplier", id))?;
        record.name = supplier.name.clone();
        record.contact_email = supplier.contact_email.clone();
        record.phone = supplier.phone.clone();
        record.rating = supplier.rating;
        Ok(record.clone())
    }

    async fn list_shipments_for_supplier(&self, id: i64) -> Result<Vec<Shipment>> {
        let tables = self.tables.lock();
        Ok(tables
            .shipments
            .iter()
            .filter(|s| s.supplier_id == id)
            .cloned()
            .collect())
    }

    async fn save_supplier_risk(
        &self,
        id: i64,
        risk: &SupplierRisk,
        escalation: Option<&NewAlert>,
    ) -> Result<SavedRisk> {
        let mut tables = self.tables.lock();
        let index = tables
            .suppliers
            .iter()
            .position(|s| s.supplier_id == id)
            .ok_or_else(|| CoreError::not_found("supplier", id))?;
        let previous_level = tables.suppliers[index]
            .risk
            .as_ref()
            .map(|r| r.risk_level);

        let escalation = match escalation {
            Some(alert) if previous_level != Some(RiskLevel::High) => {
                let open = tables
                    .open_alert(alert.entity_type, alert.entity_id, alert.alert_type)
                    .cloned();
                Some(match open {
                    Some(existing) => RaiseOutcome::AlreadyOpen(existing),
                    None => RaiseOutcome::Raised(tables.insert_alert(alert, risk.computed_at)),
                })
            }
            _ => None,
        };

        tables.suppliers[index].risk = Some(risk.clone());
        let metric_id = tables.next_id();
        tables.metrics.push(SupplierMetrics {
            metric_id,
            supplier_id: id,
            record_date: risk.computed_at.date_naive(),
            on_time_rate: risk.on_time_rate,
            avg_delay_days: risk.avg_delay_days,
            risk_score: risk.risk_score,
            risk_level: risk.risk_level,
            delivered_shipments: risk.delivered_shipments,
            recorded_at: risk.computed_at,
        });

        Ok(SavedRisk {
            previous_level,
            escalation,
        })
    }

    async fn list_supplier_metrics(&self, id: i64, limit: u32) -> Result<Vec<SupplierMetrics>> {
        let tables = self.tables.lock();
        let mut rows: Vec<_> = tables
            .metrics
            .iter()
            .filter(|m| m.supplier_id == id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then(b.metric_id.cmp(&a.metric_id))
        });
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.tables.lock().products.clone())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let mut tables = self.tables.lock();
        let supplier_name = tables
            .supplier_name(product.supplier_id)
            .ok_or_else(|| CoreError::not_found("supplier", product.supplier_id))?;
        let record = Product {
            product_id: tables.next_id(),
            supplier_id: product.supplier_id,
            supplier_name: Some(supplier_name),
            name: product.name.clone(),
            sku: product.sku.clone(),
            category: product.category.clone(),
            unit_cost: product.unit_cost,
            lead_time_days: product.lead_time_days,
        };
        tables.products.push(record.clone());
        Ok(record)
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        Ok(self.tables.lock().warehouses.clone())
    }

    async fn create_warehouse(&self, warehouse: &NewWarehouse) -> Result<Warehouse> {
        let mut tables = self.tables.lock();
        let record = Warehouse {
            warehouse_id: tables.next_id(),
            name: warehouse.name.clone(),
            location: warehouse.location.clone(),
        };
        tables.warehouses.push(record.clone());
        Ok(record)
    }

    async fn list_inventory(&self) -> Result<Vec<Inventory>> {
        let tables = self.tables.lock();
        let mut rows = tables.inventory.clone();
        rows.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(rows)
    }

    async fn upsert_inventory(&self, inventory: &NewInventory) -> Result<Inventory> {
        let mut tables = self.tables.lock();
        let product = tables
            .product_name(inventory.product_id)
            .map(|p| (p.name.clone(), p.sku.clone()))
            .ok_or_else(|| CoreError::not_found("product", inventory.product_id))?;
        let warehouse_name = tables
            .warehouse_name(inventory.warehouse_id)
            .ok_or_else(|| CoreError::not_found("warehouse", inventory.warehouse_id))?;
        let now = self.clock.now();

        if let Some(row) = tables.inventory.iter_mut().find(|i| {
            i.product_id == inventory.product_id && i.warehouse_id == inventory.warehouse_id
        }) {
            row.quantity = inventory.quantity;
            row.reorder_threshold = inventory.reorder_threshold;
            row.safety_stock = inventory.safety_stock;
            row.last_updated = now;
            return Ok(row.clone());
        }

        let record = Inventory {
            inventory_id: tables.next_id(),
            product_id: inventory.product_id,
            warehouse_id: inventory.warehouse_id,
            product_name: Some(product.0),
            sku: product.1,
            warehouse_name: Some(warehouse_name),
            quantity: inventory.quantity,
            reorder_threshold: inventory.reorder_threshold,
            safety_stock: inventory.safety_stock,
            last_updated: now,
        };
        tables.inventory.push(record.clone());
        Ok(record)
    }

    async fn get_shipment(&self, id: i64) -> Result<Option<Shipment>> {
        let tables = self.tables.lock();
        Ok(tables.shipments.iter().find(|s| s.shipment_id == id).cloned())
    }

    async fn list_shipments(&self) -> Result<Vec<ShipmentListing>> {
        let tables = self.tables.lock();
        let mut rows: Vec<_> = tables
            .shipments
            .iter()
            .map(|s| ShipmentListing {
                shipment: s.clone(),
                supplier_name: tables.supplier_name(s.supplier_id),
                product_name: tables.product_name(s.product_id).map(|p| p.name.clone()),
                warehouse_name: tables.warehouse_name(s.warehouse_id),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.shipment
                .ship_date
                .cmp(&a.shipment.ship_date)
                .then(b.shipment.shipment_id.cmp(&a.shipment.shipment_id))
        });
        Ok(rows)
    }

    async fn create_shipment(&self, shipment: &NewShipment) -> Result<Shipment> {
        let mut tables = self.tables.lock();
        tables.require_refs(shipment.supplier_id, shipment.product_id, shipment.warehouse_id)?;
        let record = Shipment {
            shipment_id: tables.next_id(),
            supplier_id: shipment.supplier_id,
            product_id: shipment.product_id,
            warehouse_id: shipment.warehouse_id,
            quantity: shipment.quantity,
            ship_date: shipment.ship_date,
            expected_arrival_date: shipment.expected_arrival_date,
            actual_arrival_date: None,
            status: shipment.status,
        };
        let event_id = tables.next_id();
        tables.events.push(ShipmentEvent {
            event_id,
            shipment_id: record.shipment_id,
            event_time: self.clock.now(),
            event_type: "CREATED".to_string(),
            details: Some("created".to_string()),
        });
        tables.shipments.push(record.clone());
        Ok(record)
    }

    async fn update_shipment(&self, id: i64, update: &ShipmentUpdate) -> Result<Shipment> {
        let mut tables = self.tables.lock();
        let event_id = tables.next_id();
        let record = tables
            .shipments
            .iter_mut()
            .find(|s| s.shipment_id == id)
            .ok_or_else(|| CoreError::not_found("shipment", id))?;

        let status_changed = update.status.is_some_and(|s| s != record.status);
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(actual) = update.actual_arrival_date {
            record.actual_arrival_date = Some(actual);
        }
        if let Some(expected) = update.expected_arrival_date {
            record.expected_arrival_date = expected;
        }
        if let Some(quantity) = update.quantity {
            record.quantity = quantity;
        }
        let record = record.clone();

        if status_changed {
            tables.events.push(ShipmentEvent {
                event_id,
                shipment_id: id,
                event_time: self.clock.now(),
                event_type: record.status.as_str().to_string(),
                details: Some("status updated".to_string()),
            });
        }
        Ok(record)
    }

    async fn list_shipment_events(&self, id: i64) -> Result<Vec<ShipmentEvent>> {
        let tables = self.tables.lock();
        let mut rows: Vec<_> = tables
            .events
            .iter()
            .filter(|e| e.shipment_id == id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.event_time
                .cmp(&a.event_time)
                .then(b.event_id.cmp(&a.event_id))
        });
        Ok(rows)
    }

    async fn create_alert(&self, alert: &NewAlert, created_at: DateTime<Utc>) -> Result<Alert> {
        let mut tables = self.tables.lock();
        if tables
            .open_alert(alert.entity_type, alert.entity_id, alert.alert_type)
            .is_some()
        {
            return Err(CoreError::DuplicateOpenAlert {
                entity_type: alert.entity_type,
                entity_id: alert.entity_id,
                alert_type: alert.alert_type,
            });
        }
        Ok(tables.insert_alert(alert, created_at))
    }

    async fn find_open_alert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<Alert>> {
        let tables = self.tables.lock();
        Ok(tables.open_alert(entity_type, entity_id, alert_type).cloned())
    }

    async fn resolve_alert(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<Alert> {
        let mut tables = self.tables.lock();
        let alert = tables
            .alerts
            .iter_mut()
            .find(|a| a.alert_id == id)
            .ok_or_else(|| CoreError::not_found("alert", id))?;
        if alert.resolved {
            return Err(CoreError::AlreadyResolved(id));
        }
        alert.resolved = true;
        alert.resolved_at = Some(resolved_at);
        Ok(alert.clone())
    }

    async fn list_alerts(&self, resolved: bool) -> Result<Vec<Alert>> {
        let tables = self.tables.lock();
        let mut rows: Vec<_> = tables
            .alerts
            .iter()
            .filter(|a| a.resolved == resolved)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.alert_id.cmp(&a.alert_id))
        });
        Ok(rows)
    }

    async fn count_suppliers(&self) -> Result<i64> {
        Ok(self.tables.lock().suppliers.len() as i64)
    }

    async fn count_in_transit_shipments(&self) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables
            .shipments
            .iter()
            .filter(|s| s.status == ShipmentStatus::InTransit)
            .count() as i64)
    }

    async fn count_open_alerts(&self) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables.alerts.iter().filter(|a| a.is_open()).count() as i64)
    }

    async fn count_critical_inventory(&self) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables
            .inventory
            .iter()
            .filter(|i| i.status() == InventoryStatus::Critical)
            .count() as i64)
    }
}
