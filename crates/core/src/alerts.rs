//! Alert lifecycle
//!
//! ## Table of Contents
//! - **RaiseOutcome**: new alert vs. the already-open one for the same tuple
//! - **AlertEngine**: raise with deduplication, resolve once, list, and the
//!   evaluation pass over shipments and inventory
//!
//! An alert is OPEN until resolved and RESOLVED forever after. For a given
//! `(entity_type, entity_id, alert_type)` at most one alert is open.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::AlertConfig;
use crate::error::{CoreError, Result};
use crate::model::{
    Alert, AlertType, EntityType, Inventory, InventoryStatus, NewAlert, Severity, Shipment,
    Supplier,
};
use crate::store::DataStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "alert", rename_all = "snake_case")]
pub enum RaiseOutcome {
    /// A new alert was created
    Raised(Alert),
    /// The condition is already represented by this open alert
    AlreadyOpen(Alert),
}

impl RaiseOutcome {
    pub fn alert(&self) -> &Alert {
        match self {
            Self::Raised(alert) | Self::AlreadyOpen(alert) => alert,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Raised(_))
    }
}

/// Counts from one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    pub shipments_checked: usize,
    pub inventory_checked: usize,
    pub raised: usize,
    pub already_open: usize,
}

impl EvaluationSummary {
    fn record(&mut self, outcome: Option<RaiseOutcome>) {
        match outcome {
            Some(RaiseOutcome::Raised(_)) => self.raised += 1,
            Some(RaiseOutcome::AlreadyOpen(_)) => self.already_open += 1,
            None => {}
        }
    }
}

/// SUPPLIER_HIGH_RISK alert for a supplier entering HIGH. Raised by the
/// store together with the risk save, not through `AlertEngine::raise`.
pub fn supplier_high_risk_alert(supplier: &Supplier, risk_score: f64) -> NewAlert {
    NewAlert {
        alert_type: AlertType::SupplierHighRisk,
        severity: Severity::Critical,
        entity_type: EntityType::Supplier,
        entity_id: supplier.supplier_id,
        message: format!(
            "Supplier {} ({}) classified HIGH risk with score {:.1}",
            supplier.supplier_id, supplier.name, risk_score
        ),
    }
}

#[derive(Clone)]
pub struct AlertEngine {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    config: AlertConfig,
}

impl AlertEngine {
    pub fn new(store: Arc<dyn DataStore>, clock: Arc<dyn Clock>, config: AlertConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// WARNING for short delays, CRITICAL beyond `short_delay_days`.
    pub fn severity_for_delay(&self, delay_days: i64) -> Severity {
        if delay_days <= self.config.short_delay_days {
            Severity::Warning
        } else {
            Severity::Critical
        }
    }

    /// Raise an alert unless one is already open for its tuple.
    ///
    /// The store refuses duplicate open alerts, so when two callers race the
    /// loser gets the winner's alert back as `AlreadyOpen`.
    pub async fn raise(&self, alert: NewAlert) -> Result<RaiseOutcome> {
        if let Some(existing) = self.find_open(&alert).await? {
            debug!(alert_id = existing.alert_id, "alert already open");
            return Ok(RaiseOutcome::AlreadyOpen(existing));
        }

        match self.store.create_alert(&alert, self.clock.now()).await {
            Ok(created) => {
                info!(
                    alert_id = created.alert_id,
                    alert_type = %created.alert_type,
                    severity = %created.severity,
                    entity_type = %created.entity_type,
                    entity_id = created.entity_id,
                    "alert raised"
                );
                Ok(RaiseOutcome::Raised(created))
            }
            Err(err @ CoreError::DuplicateOpenAlert { .. }) => match self.find_open(&alert).await? {
                Some(existing) => {
                    debug!(alert_id = existing.alert_id, "lost alert race, reusing open alert");
                    Ok(RaiseOutcome::AlreadyOpen(existing))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    async fn find_open(&self, alert: &NewAlert) -> Result<Option<Alert>> {
        self.store
            .find_open_alert(alert.entity_type, alert.entity_id, alert.alert_type)
            .await
    }

    /// Raise SHIPMENT_DELAYED when the shipment is past its expected date.
    /// Returns `None` when the shipment is not delayed.
    pub async fn evaluate_shipment(&self, shipment: &Shipment) -> Result<Option<RaiseOutcome>> {
        let delay = shipment.delay_days(self.clock.today());
        if delay == 0 {
            return Ok(None);
        }

        let message = if shipment.is_delivered() {
            format!(
                "Shipment #{} arrived {} day(s) late (expected {})",
                shipment.shipment_id, delay, shipment.expected_arrival_date
            )
        } else {
            format!(
                "Shipment #{} is {} day(s) past its expected arrival ({})",
                shipment.shipment_id, delay, shipment.expected_arrival_date
            )
        };

        self.raise(NewAlert {
            alert_type: AlertType::ShipmentDelayed,
            severity: self.severity_for_delay(delay),
            entity_type: EntityType::Shipment,
            entity_id: shipment.shipment_id,
            message,
        })
        .await
        .map(Some)
    }

    /// Raise LOW_INVENTORY for rows below their reorder threshold.
    pub async fn evaluate_inventory(&self, row: &Inventory) -> Result<Option<RaiseOutcome>> {
        let (severity, detail) = match row.status() {
            InventoryStatus::Ok => return Ok(None),
            InventoryStatus::Low => (Severity::Warning, "below reorder threshold"),
            InventoryStatus::Critical => (Severity::Critical, "below safety stock"),
        };

        self.raise(NewAlert {
            alert_type: AlertType::LowInventory,
            severity,
            entity_type: EntityType::Inventory,
            entity_id: row.inventory_id,
            message: format!(
                "Inventory for product {} at warehouse {} is {} ({} on hand)",
                row.product_id, row.warehouse_id, detail, row.quantity
            ),
        })
        .await
        .map(Some)
    }

    /// Re-check every shipment and inventory row.
    pub async fn evaluate_all(&self) -> Result<EvaluationSummary> {
        let mut summary = EvaluationSummary::default();

        for listing in self.store.list_shipments().await? {
            summary.shipments_checked += 1;
            summary.record(self.evaluate_shipment(&listing.shipment).await?);
        }
        for row in self.store.list_inventory().await? {
            summary.inventory_checked += 1;
            summary.record(self.evaluate_inventory(&row).await?);
        }

        info!(
            shipments = summary.shipments_checked,
            inventory = summary.inventory_checked,
            raised = summary.raised,
            already_open = summary.already_open,
            "alert evaluation pass complete"
        );
        Ok(summary)
    }

    /// OPEN -> RESOLVED. A second call fails with `AlreadyResolved` and
    /// leaves `resolved_at` as first written.
    pub async fn resolve(&self, alert_id: i64) -> Result<Alert> {
        match self.store.resolve_alert(alert_id, self.clock.now()).await {
            Ok(alert) => {
                info!(alert_id, "alert resolved");
                Ok(alert)
            }
            Err(err) => {
                warn!(alert_id, error = %err, "resolve rejected");
                Err(err)
            }
        }
    }

    pub async fn list(&self, resolved: bool) -> Result<Vec<Alert>> {
        self.store.list_alerts(resolved).await
    }

    /// Demo alerts for an empty dashboard. Labels of the alerts actually
    /// created are returned; tuples that are already open are skipped.
    pub async fn generate_test_alerts(&self) -> Result<Vec<&'static str>> {
        let samples = [
            (
                "Shipment delay alert",
                NewAlert {
                    alert_type: AlertType::ShipmentDelayed,
                    severity: Severity::Warning,
                    entity_type: EntityType::Shipment,
                    entity_id: 1,
                    message: "Test: Shipment #1 is delayed".to_string(),
                },
            ),
            (
                "Low inventory alert",
                NewAlert {
                    alert_type: AlertType::LowInventory,
                    severity: Severity::Warning,
                    entity_type: EntityType::Inventory,
                    entity_id: 1,
                    message: "Test: Inventory low for product at warehouse".to_string(),
                },
            ),
            (
                "Critical inventory alert",
                NewAlert {
                    alert_type: AlertType::LowInventory,
                    severity: Severity::Critical,
                    entity_type: EntityType::Inventory,
                    entity_id: 2,
                    message: "Test: CRITICAL - Inventory below safety stock".to_string(),
                },
            ),
        ];

        let mut created = Vec::new();
        for (label, alert) in samples {
            if self.raise(alert).await?.is_new() {
                created.push(label);
            }
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{
        NewInventory, NewProduct, NewShipment, NewSupplier, NewWarehouse, ShipmentStatus,
    };
    use crate::store::scripted::ScriptedStore;
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(today: NaiveDate) -> (Arc<MemoryStore>, AlertEngine) {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(today));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let engine = AlertEngine::new(store.clone(), clock, AlertConfig::default());
        (store, engine)
    }

    /// One supplier, product and warehouse; returns a shipment expected on
    /// `expected` that has not arrived.
    async fn seed_shipment(store: &MemoryStore, expected: NaiveDate) -> Shipment {
        let supplier = store
            .create_supplier(&NewSupplier {
                name: "Acme".into(),
                contact_email: None,
                phone: None,
                rating: 3.5,
            })
            .await
            .unwrap();
        let product = store
            .create_product(&NewProduct {
                supplier_id: supplier.supplier_id,
                name: "Bolt".into(),
                sku: Some("B-1".into()),
                category: None,
                unit_cost: 0.2,
                lead_time_days: 2,
            })
            .await
            .unwrap();
        let warehouse = store
            .create_warehouse(&NewWarehouse {
                name: "Dock".into(),
                location: None,
            })
            .await
            .unwrap();
        store
            .create_shipment(&NewShipment {
                supplier_id: supplier.supplier_id,
                product_id: product.product_id,
                warehouse_id: warehouse.warehouse_id,
                quantity: 100,
                ship_date: date(2024, 1, 1),
                expected_arrival_date: expected,
                status: ShipmentStatus::InTransit,
            })
            .await
            .unwrap()
    }

    fn custom_alert(entity_id: i64) -> NewAlert {
        NewAlert {
            alert_type: AlertType::Custom,
            severity: Severity::Info,
            entity_type: EntityType::System,
            entity_id,
            message: "Custom alert".into(),
        }
    }

    #[tokio::test]
    async fn test_lost_race_returns_winning_alert() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(2024, 1, 15)));
        let store = Arc::new(ScriptedStore::default());
        let engine = AlertEngine::new(store.clone(), clock, AlertConfig::default());

        let winner = store.create_alert(&custom_alert(3), Utc::now()).await.unwrap();
        // The pre-check misses the winner, so the insert hits the duplicate
        store.stale_lookups(1);

        let outcome = engine.raise(custom_alert(3)).await.unwrap();
        assert_eq!(outcome, RaiseOutcome::AlreadyOpen(winner));
        assert_eq!(store.count_open_alerts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_without_visible_winner_is_an_error() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(2024, 1, 15)));
        let store = Arc::new(ScriptedStore::default());
        let engine = AlertEngine::new(store.clone(), clock, AlertConfig::default());

        store.create_alert(&custom_alert(4), Utc::now()).await.unwrap();
        store.stale_lookups(2);

        let err = engine.raise(custom_alert(4)).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateOpenAlert { entity_id: 4, .. }));
    }

    #[tokio::test]
    async fn test_late_shipment_raises_exactly_one_alert() {
        let (store, engine) = setup(date(2024, 1, 15)).await;
        let shipment = seed_shipment(&store, date(2024, 1, 10)).await;

        let first = engine.evaluate_shipment(&shipment).await.unwrap().unwrap();
        assert!(first.is_new());
        assert_eq!(first.alert().severity, Severity::Critical);
        assert!(first.alert().message.contains("5 day(s)"));

        let second = engine.evaluate_shipment(&shipment).await.unwrap().unwrap();
        assert_eq!(second, RaiseOutcome::AlreadyOpen(first.alert().clone()));
        assert_eq!(store.count_open_alerts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_on_time_shipment_raises_nothing() {
        let (store, engine) = setup(date(2024, 1, 5)).await;
        let shipment = seed_shipment(&store, date(2024, 1, 10)).await;
        assert!(engine.evaluate_shipment(&shipment).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_short_delay_is_warning() {
        let (_store, engine) = setup(date(2024, 1, 1)).await;
        assert_eq!(engine.severity_for_delay(1), Severity::Warning);
        assert_eq!(engine.severity_for_delay(3), Severity::Warning);
        assert_eq!(engine.severity_for_delay(4), Severity::Critical);
    }

    #[tokio::test]
    async fn test_recurrence_after_resolve_creates_one_new_alert() {
        let (store, engine) = setup(date(2024, 1, 15)).await;
        let shipment = seed_shipment(&store, date(2024, 1, 10)).await;

        let first = engine.evaluate_shipment(&shipment).await.unwrap().unwrap();
        engine.resolve(first.alert().alert_id).await.unwrap();

        let again = engine.evaluate_shipment(&shipment).await.unwrap().unwrap();
        assert!(again.is_new());
        assert_ne!(again.alert().alert_id, first.alert().alert_id);

        let repeat = engine.evaluate_shipment(&shipment).await.unwrap().unwrap();
        assert!(!repeat.is_new());
        assert_eq!(store.list_alerts(false).await.unwrap().len(), 1);
        assert_eq!(store.list_alerts(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_errors() {
        let (_store, engine) = setup(date(2024, 1, 15)).await;
        assert_eq!(
            engine.resolve(99).await.unwrap_err(),
            CoreError::not_found("alert", 99)
        );

        let raised = engine
            .raise(NewAlert {
                alert_type: AlertType::Custom,
                severity: Severity::Info,
                entity_type: EntityType::System,
                entity_id: 0,
                message: "hello".into(),
            })
            .await
            .unwrap();
        let id = raised.alert().alert_id;
        let resolved = engine.resolve(id).await.unwrap();
        assert_eq!(
            engine.resolve(id).await.unwrap_err(),
            CoreError::AlreadyResolved(id)
        );
        let listed = engine.list(true).await.unwrap();
        assert_eq!(listed[0].resolved_at, resolved.resolved_at);
    }

    #[tokio::test]
    async fn test_evaluate_all_is_idempotent() {
        let (store, engine) = setup(date(2024, 1, 15)).await;
        let shipment = seed_shipment(&store, date(2024, 1, 10)).await;
        store
            .upsert_inventory(&NewInventory {
                product_id: shipment.product_id,
                warehouse_id: shipment.warehouse_id,
                quantity: 2,
                reorder_threshold: 20,
                safety_stock: 5,
            })
            .await
            .unwrap();

        let first = engine.evaluate_all().await.unwrap();
        assert_eq!(first.raised, 2);
        assert_eq!(first.already_open, 0);

        let second = engine.evaluate_all().await.unwrap();
        assert_eq!(second.raised, 0);
        assert_eq!(second.already_open, 2);
        assert_eq!(store.count_open_alerts().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_generate_test_alerts_respects_dedup() {
        let (_store, engine) = setup(date(2024, 1, 15)).await;
        assert_eq!(engine.generate_test_alerts().await.unwrap().len(), 3);
        assert!(engine.generate_test_alerts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let (store, _) = setup(date(2024, 1, 15)).await;
        let base = FixedClock::on(date(2024, 1, 15)).0;
        for (offset, entity_id) in [(0, 1), (2, 2), (1, 3)] {
            store
                .create_alert(
                    &NewAlert {
                        alert_type: AlertType::Custom,
                        severity: Severity::Info,
                        entity_type: EntityType::System,
                        entity_id,
                        message: String::new(),
                    },
                    base + chrono::Duration::minutes(offset),
                )
                .await
                .unwrap();
        }
        let ids: Vec<i64> = store
            .list_alerts(false)
            .await
            .unwrap()
            .iter()
            .map(|a| a.entity_id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }
}
