//! Read-only dashboard views
//!
//! ## Table of Contents
//! - **Pure functions**: `inventory_health`, `supplier_risk_view`,
//!   `shipment_views`, `delayed_shipments`
//! - **Dashboard**: snapshots the store and applies the functions above
//!
//! Nothing here writes to the store. Every call recomputes from current
//! state; there is no cache.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::clock::Clock;
use crate::error::Result;
use crate::model::{RiskLevel, ShipmentListing, ShipmentStatus, Supplier};
use crate::store::DataStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardMetrics {
    pub suppliers: i64,
    /// Shipments currently IN_TRANSIT
    pub transit: i64,
    /// Open alerts
    pub alerts: i64,
    /// "OK" or "<n> Critical"
    pub inventory: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupplierRiskRow {
    pub supplier_id: i64,
    pub name: String,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub on_time_rate: f64,
    pub avg_delay_days: f64,
    pub record_date: NaiveDate,
}

/// Shipment as displayed: joined names plus the derived delay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShipmentView {
    pub shipment_id: i64,
    pub supplier_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub supplier_name: Option<String>,
    pub product_name: Option<String>,
    pub warehouse_name: Option<String>,
    pub quantity: i64,
    pub ship_date: NaiveDate,
    pub expected_arrival_date: NaiveDate,
    pub actual_arrival_date: Option<NaiveDate>,
    pub status: ShipmentStatus,
    pub delay_days: i64,
}

pub fn inventory_health(critical_rows: i64) -> String {
    if critical_rows > 0 {
        format!("{critical_rows} Critical")
    } else {
        "OK".to_string()
    }
}

/// Suppliers with a computed risk, highest score first. The rates are the
/// ones stored by the risk engine, not recomputed here.
pub fn supplier_risk_view(suppliers: &[Supplier]) -> Vec<SupplierRiskRow> {
    let mut rows: Vec<SupplierRiskRow> = suppliers
        .iter()
        .filter_map(|s| {
            s.risk.as_ref().map(|risk| SupplierRiskRow {
                supplier_id: s.supplier_id,
                name: s.name.clone(),
                risk_score: risk.risk_score,
                risk_level: risk.risk_level,
                on_time_rate: risk.on_time_rate,
                avg_delay_days: risk.avg_delay_days,
                record_date: risk.computed_at.date_naive(),
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then(a.supplier_id.cmp(&b.supplier_id))
    });
    rows
}

pub fn shipment_views(listings: &[ShipmentListing], today: NaiveDate) -> Vec<ShipmentView> {
    listings
        .iter()
        .map(|l| {
            let s = &l.shipment;
            ShipmentView {
                shipment_id: s.shipment_id,
                supplier_id: s.supplier_id,
                product_id: s.product_id,
                warehouse_id: s.warehouse_id,
                supplier_name: l.supplier_name.clone(),
                product_name: l.product_name.clone(),
                warehouse_name: l.warehouse_name.clone(),
                quantity: s.quantity,
                ship_date: s.ship_date,
                expected_arrival_date: s.expected_arrival_date,
                actual_arrival_date: s.actual_arrival_date,
                status: s.status,
                delay_days: s.delay_days(today),
            }
        })
        .collect()
}

/// Shipments with a positive delay, longest delay first.
pub fn delayed_shipments(listings: &[ShipmentListing], today: NaiveDate) -> Vec<ShipmentView> {
    let mut rows: Vec<ShipmentView> = shipment_views(listings, today)
        .into_iter()
        .filter(|v| v.delay_days > 0)
        .collect();
    rows.sort_by(|a, b| {
        b.delay_days
            .cmp(&a.delay_days)
            .then(a.shipment_id.cmp(&b.shipment_id))
    });
    rows
}

#[derive(Clone)]
pub struct Dashboard {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
}

impl Dashboard {
    pub fn new(store: Arc<dyn DataStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn metrics(&self) -> Result<DashboardMetrics> {
        Ok(DashboardMetrics {
            suppliers: self.store.count_suppliers().await?,
            transit: self.store.count_in_transit_shipments().await?,
            alerts: self.store.count_open_alerts().await?,
            inventory: inventory_health(self.store.count_critical_inventory().await?),
        })
    }

    pub async fn supplier_risk(&self) -> Result<Vec<SupplierRiskRow>> {
        let suppliers = self.store.list_suppliers().await?;
        Ok(supplier_risk_view(&suppliers))
    }

    pub async fn shipments(&self) -> Result<Vec<ShipmentView>> {
        let listings = self.store.list_shipments().await?;
        Ok(shipment_views(&listings, self.clock.today()))
    }

    pub async fn delayed_shipments(&self) -> Result<Vec<ShipmentView>> {
        let listings = self.store.list_shipments().await?;
        Ok(delayed_shipments(&listings, self.clock.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Shipment, SupplierRisk};
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn listing(id: i64, expected: NaiveDate, actual: Option<NaiveDate>) -> ShipmentListing {
        ShipmentListing {
            shipment: Shipment {
                shipment_id: id,
                supplier_id: 1,
                product_id: 1,
                warehouse_id: 1,
                quantity: 5,
                ship_date: date(2024, 1, 1),
                expected_arrival_date: expected,
                actual_arrival_date: actual,
                status: if actual.is_some() {
                    ShipmentStatus::Delivered
                } else {
                    ShipmentStatus::InTransit
                },
            },
            supplier_name: Some("Acme".into()),
            product_name: None,
            warehouse_name: None,
        }
    }

    fn supplier(id: i64, score: Option<f64>) -> Supplier {
        Supplier {
            supplier_id: id,
            name: format!("S{id}"),
            contact_email: None,
            phone: None,
            rating: 0.0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            risk: score.map(|risk_score| SupplierRisk {
                risk_score,
                risk_level: RiskLevel::Medium,
                on_time_rate: 0.5,
                avg_delay_days: 2.0,
                delivered_shipments: 4,
                computed_at: Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap(),
            }),
        }
    }

    #[test]
    fn test_inventory_health() {
        assert_eq!(inventory_health(0), "OK");
        assert_eq!(inventory_health(3), "3 Critical");
    }

    #[test]
    fn test_supplier_risk_view_skips_uncomputed() {
        let rows = supplier_risk_view(&[
            supplier(1, Some(40.0)),
            supplier(2, None),
            supplier(3, Some(55.5)),
        ]);
        let ids: Vec<i64> = rows.iter().map(|r| r.supplier_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(rows[0].on_time_rate, 0.5);
        assert_eq!(rows[0].record_date, date(2024, 1, 2));
    }

    #[test]
    fn test_delayed_shipments_view() {
        let today = date(2024, 1, 15);
        let listings = vec![
            listing(1, date(2024, 1, 10), None),
            listing(2, date(2024, 1, 20), None),
            listing(3, date(2024, 1, 5), Some(date(2024, 1, 4))),
            listing(4, date(2024, 1, 1), Some(date(2024, 1, 9))),
        ];
        let delayed = delayed_shipments(&listings, today);
        let got: Vec<(i64, i64)> = delayed.iter().map(|v| (v.shipment_id, v.delay_days)).collect();
        assert_eq!(got, vec![(4, 8), (1, 5)]);
        assert!(shipment_views(&listings, today).iter().all(|v| v.delay_days >= 0));
    }
}
