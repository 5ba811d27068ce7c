//! Supplier risk classification
//!
//! ## Table of Contents
//! - **DeliveryStats**: on-time rate and average delay over delivered shipments
//! - **score**: deterministic 0-100 score from the stats
//! - **RiskEngine**: compute, persist, and raise SUPPLIER_HIGH_RISK on the
//!   transition into HIGH

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::alerts::{supplier_high_risk_alert, RaiseOutcome};
use crate::clock::Clock;
use crate::config::RiskConfig;
use crate::error::{CoreError, Result};
use crate::model::{Alert, RiskLevel, Shipment, SupplierRisk};
use crate::store::DataStore;

/// Delivery performance over a supplier's delivered shipments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeliveryStats {
    pub delivered: i64,
    pub on_time_rate: f64,
    pub avg_delay_days: f64,
}

impl DeliveryStats {
    /// Only shipments with a recorded arrival date are measured. With
    /// nothing delivered the supplier is treated as fully on time.
    pub fn from_shipments(shipments: &[Shipment], today: NaiveDate) -> Self {
        let delivered: Vec<&Shipment> = shipments.iter().filter(|s| s.is_delivered()).collect();
        if delivered.is_empty() {
            return Self {
                delivered: 0,
                on_time_rate: 1.0,
                avg_delay_days: 0.0,
            };
        }

        let count = delivered.len() as f64;
        let on_time = delivered
            .iter()
            .filter(|s| s.arrived_on_time() == Some(true))
            .count() as f64;
        let total_delay: i64 = delivered.iter().map(|s| s.delay_days(today)).sum();

        Self {
            delivered: delivered.len() as i64,
            on_time_rate: on_time / count,
            avg_delay_days: total_delay as f64 / count,
        }
    }
}

/// Risk score on a 0-100 scale, monotonic in the late fraction and the
/// average delay. Rounded to two decimals.
pub fn score(stats: &DeliveryStats, config: &RiskConfig) -> f64 {
    let late_fraction = (1.0 - stats.on_time_rate).clamp(0.0, 1.0);
    let delay_term = (stats.avg_delay_days / config.delay_cap_days).clamp(0.0, 1.0);
    let raw = config.late_weight * late_fraction + config.delay_weight * delay_term;
    let scaled = 100.0 * raw.clamp(0.0, 1.0);
    (scaled * 100.0).round() / 100.0
}

/// Result of one compute-risk call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub supplier_id: i64,
    #[serde(flatten)]
    pub risk: SupplierRisk,
    pub previous_level: Option<RiskLevel>,
    /// The SUPPLIER_HIGH_RISK alert raised by this call, if any.
    pub alert: Option<Alert>,
}

pub struct RiskEngine {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(store: Arc<dyn DataStore>, clock: Arc<dyn Clock>, config: RiskConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Pure part of the computation: shipments in, risk record out.
    pub fn assess(&self, shipments: &[Shipment]) -> SupplierRisk {
        let now = self.clock.now();
        let stats = DeliveryStats::from_shipments(shipments, now.date_naive());
        let risk_score = score(&stats, &self.config);
        SupplierRisk {
            risk_score,
            risk_level: self.config.classify(risk_score),
            on_time_rate: stats.on_time_rate,
            avg_delay_days: stats.avg_delay_days,
            delivered_shipments: stats.delivered,
            computed_at: now,
        }
    }

    /// Recompute and persist a supplier's risk.
    ///
    /// Raises one SUPPLIER_HIGH_RISK alert when the stored level moves into
    /// HIGH. The store writes the level and the alert in one atomic step, so
    /// concurrent computes cannot both observe the transition and a failed
    /// alert write leaves the old level in place.
    pub async fn compute(&self, supplier_id: i64) -> Result<RiskAssessment> {
        let supplier = self
            .store
            .get_supplier(supplier_id)
            .await?
            .ok_or_else(|| CoreError::not_found("supplier", supplier_id))?;
        let shipments = self.store.list_shipments_for_supplier(supplier_id).await?;

        let risk = self.assess(&shipments);
        debug!(
            supplier_id,
            shipments = shipments.len(),
            delivered = risk.delivered_shipments,
            score = risk.risk_score,
            "computed supplier risk"
        );

        let escalation = (risk.risk_level == RiskLevel::High)
            .then(|| supplier_high_risk_alert(&supplier, risk.risk_score));
        let saved = self
            .store
            .save_supplier_risk(supplier_id, &risk, escalation.as_ref())
            .await?;

        let alert = match saved.escalation {
            Some(RaiseOutcome::Raised(raised)) => {
                info!(
                    supplier_id,
                    alert_id = raised.alert_id,
                    score = risk.risk_score,
                    previous = ?saved.previous_level,
                    "supplier escalated to HIGH risk"
                );
                Some(raised)
            }
            Some(RaiseOutcome::AlreadyOpen(existing)) => {
                debug!(alert_id = existing.alert_id, "high risk alert already open");
                None
            }
            None => None,
        };

        Ok(RiskAssessment {
            supplier_id,
            risk,
            previous_level: saved.previous_level,
            alert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::{
        AlertType, NewProduct, NewShipment, NewSupplier, NewWarehouse, ShipmentStatus,
        ShipmentUpdate,
    };
    use crate::store::scripted::ScriptedStore;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn delivered(expected: NaiveDate, late_by: i64) -> Shipment {
        Shipment {
            shipment_id: 0,
            supplier_id: 1,
            product_id: 1,
            warehouse_id: 1,
            quantity: 1,
            ship_date: expected - chrono::Duration::days(5),
            expected_arrival_date: expected,
            actual_arrival_date: Some(expected + chrono::Duration::days(late_by)),
            status: ShipmentStatus::Delivered,
        }
    }

    #[test]
    fn test_ten_deliveries_three_late_by_five() {
        let expected = date(2024, 1, 10);
        let mut shipments: Vec<Shipment> = (0..7).map(|_| delivered(expected, 0)).collect();
        shipments.extend((0..3).map(|_| delivered(expected, 5)));

        let stats = DeliveryStats::from_shipments(&shipments, date(2024, 2, 1));
        assert_eq!(stats.delivered, 10);
        assert!((stats.on_time_rate - 0.7).abs() < 1e-9);
        assert!((stats.avg_delay_days - 1.5).abs() < 1e-9);

        let config = RiskConfig::default();
        let s = score(&stats, &config);
        assert!((s - 24.0).abs() < 1e-9);
        assert_eq!(config.classify(s), RiskLevel::Low);
    }

    #[test]
    fn test_in_flight_shipments_are_not_measured() {
        let mut pending = delivered(date(2024, 1, 10), 0);
        pending.actual_arrival_date = None;
        let stats = DeliveryStats::from_shipments(&[pending], date(2024, 3, 1));
        assert_eq!(stats.delivered, 0);
        assert_eq!(score(&stats, &RiskConfig::default()), 0.0);
    }

    #[test]
    fn test_score_is_monotonic_and_bounded() {
        let config = RiskConfig::default();
        let mut last = -1.0;
        for late in 0..=10 {
            let stats = DeliveryStats {
                delivered: 10,
                on_time_rate: 1.0 - late as f64 / 10.0,
                avg_delay_days: late as f64 * 3.0,
            };
            let s = score(&stats, &config);
            assert!(s >= last);
            assert!((0.0..=100.0).contains(&s));
            last = s;
        }
        assert_eq!(last, 100.0);
    }

    struct Fixture {
        store: Arc<ScriptedStore>,
        engine: RiskEngine,
        supplier_id: i64,
        product_id: i64,
        warehouse_id: i64,
    }

    async fn fixture() -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::on(date(2024, 2, 1)));
        let store = Arc::new(ScriptedStore::wrapping(MemoryStore::with_clock(clock.clone())));
        let engine = RiskEngine::new(store.clone(), clock, RiskConfig::default());

        let supplier = store
            .create_supplier(&NewSupplier {
                name: "Acme".into(),
                contact_email: None,
                phone: None,
                rating: 4.0,
            })
            .await
            .unwrap();
        let product = store
            .create_product(&NewProduct {
                supplier_id: supplier.supplier_id,
                name: "Widget".into(),
                sku: None,
                category: None,
                unit_cost: 1.0,
                lead_time_days: 3,
            })
            .await
            .unwrap();
        let warehouse = store
            .create_warehouse(&NewWarehouse {
                name: "North".into(),
                location: None,
            })
            .await
            .unwrap();

        Fixture {
            store,
            engine,
            supplier_id: supplier.supplier_id,
            product_id: product.product_id,
            warehouse_id: warehouse.warehouse_id,
        }
    }

    impl Fixture {
        async fn deliver(&self, expected: NaiveDate, actual: NaiveDate) {
            let shipment = self
                .store
                .create_shipment(&NewShipment {
                    supplier_id: self.supplier_id,
                    product_id: self.product_id,
                    warehouse_id: self.warehouse_id,
                    quantity: 10,
                    ship_date: expected - chrono::Duration::days(3),
                    expected_arrival_date: expected,
                    status: ShipmentStatus::InTransit,
                })
                .await
                .unwrap();
            self.store
                .update_shipment(
                    shipment.shipment_id,
                    &ShipmentUpdate {
                        status: Some(ShipmentStatus::Delivered),
                        actual_arrival_date: Some(actual),
                        ..ShipmentUpdate::default()
                    },
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_compute_without_shipments_is_low() {
        let f = fixture().await;
        let assessment = f.engine.compute(f.supplier_id).await.unwrap();
        assert_eq!(assessment.risk.risk_score, 0.0);
        assert_eq!(assessment.risk.risk_level, RiskLevel::Low);
        assert_eq!(assessment.previous_level, None);
        assert!(assessment.alert.is_none());

        let stored = f.store.get_supplier(f.supplier_id).await.unwrap().unwrap();
        assert_eq!(stored.risk.unwrap().risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_compute_unknown_supplier_is_not_found() {
        let f = fixture().await;
        let err = f.engine.compute(4242).await.unwrap_err();
        assert_eq!(err, CoreError::not_found("supplier", 4242));
    }

    #[tokio::test]
    async fn test_high_transition_raises_one_alert() {
        let f = fixture().await;
        let expected = date(2024, 1, 10);
        for _ in 0..4 {
            f.deliver(expected, date(2024, 1, 25)).await;
        }

        let first = f.engine.compute(f.supplier_id).await.unwrap();
        assert_eq!(first.risk.risk_level, RiskLevel::High);
        let alert = first.alert.expect("transition into HIGH raises an alert");
        assert_eq!(alert.alert_type, AlertType::SupplierHighRisk);

        let second = f.engine.compute(f.supplier_id).await.unwrap();
        assert_eq!(second.previous_level, Some(RiskLevel::High));
        assert!(second.alert.is_none());

        let open = f.store.list_alerts(false).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(
            f.store.list_supplier_metrics(f.supplier_id, 30).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_failed_save_keeps_transition_pending() {
        let f = fixture().await;
        for _ in 0..3 {
            f.deliver(date(2024, 1, 5), date(2024, 1, 25)).await;
        }

        f.store.fail_saves(1);
        let err = f.engine.compute(f.supplier_id).await.unwrap_err();
        assert!(matches!(err, CoreError::StoreUnavailable(_)));
        let stored = f.store.get_supplier(f.supplier_id).await.unwrap().unwrap();
        assert!(stored.risk.is_none());

        let retry = f.engine.compute(f.supplier_id).await.unwrap();
        assert_eq!(retry.previous_level, None);
        assert_eq!(retry.risk.risk_level, RiskLevel::High);
        assert!(retry.alert.is_some());

        let open = f.store.list_alerts(false).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].alert_type, AlertType::SupplierHighRisk);
    }

    #[tokio::test]
    async fn test_concurrent_computes_raise_one_alert() {
        let f = fixture().await;
        for _ in 0..2 {
            f.deliver(date(2024, 1, 5), date(2024, 1, 25)).await;
        }

        let (a, b) = tokio::join!(
            f.engine.compute(f.supplier_id),
            f.engine.compute(f.supplier_id)
        );
        let raised = [a.unwrap(), b.unwrap()]
            .iter()
            .filter(|assessment| assessment.alert.is_some())
            .count();
        assert_eq!(raised, 1);
        assert_eq!(f.store.count_open_alerts().await.unwrap(), 1);
    }
}
