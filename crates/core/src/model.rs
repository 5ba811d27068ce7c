//! Domain records held by the data store
//!
//! ## Table of Contents
//! - **Closed enums**: `RiskLevel`, `ShipmentStatus`, `Severity`, `AlertType`,
//!   `EntityType`, `InventoryStatus`
//! - **Suppliers**: `Supplier`, `SupplierRisk`, `SupplierMetrics`
//! - **Catalog**: `Product`, `Warehouse`, `Inventory`
//! - **Shipments**: `Shipment`, `ShipmentListing`, `ShipmentEvent`, `delay_days`
//! - **Alerts**: `Alert`, `NewAlert`
//! - **Inputs**: the `New*` / `*Update` payloads and their validation

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Declares a closed, upper-case string enum with wire aliases.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Canonical wire spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $( $text $(| $alias)* => Ok($name::$variant), )+
                    _ => Err(CoreError::validation(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        s
                    ))),
                }
            }
        }
    };
}

string_enum! {
    /// Coarse supplier risk bucket.
    RiskLevel {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
    }
}

string_enum! {
    ShipmentStatus {
        Created => "CREATED",
        InTransit => "IN_TRANSIT" | "INTRANSIT",
        Delivered => "DELIVERED",
        Delayed => "DELAYED",
    }
}

string_enum! {
    Severity {
        Info => "INFO",
        Warning => "WARNING" | "WARN",
        Critical => "CRITICAL",
    }
}

string_enum! {
    AlertType {
        ShipmentDelayed => "SHIPMENT_DELAYED" | "SHIPMENT_DELAY",
        SupplierHighRisk => "SUPPLIER_HIGH_RISK",
        LowInventory => "LOW_INVENTORY",
        /// Raised by hand through the API.
        Custom => "CUSTOM",
    }
}

string_enum! {
    /// Kind of record an alert points at. The reference is weak: alerts
    /// outlive the entity they were raised for.
    EntityType {
        Supplier => "SUPPLIER",
        Shipment => "SHIPMENT",
        Inventory => "INVENTORY",
        System => "SYSTEM",
    }
}

string_enum! {
    InventoryStatus {
        Ok => "OK",
        Low => "LOW",
        Critical => "CRITICAL",
    }
}

// =============================================================================
// Suppliers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub supplier_id: i64,
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    /// Absent until the risk engine has run for this supplier.
    pub risk: Option<SupplierRisk>,
}

/// Output of one risk computation, persisted onto the supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRisk {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub on_time_rate: f64,
    pub avg_delay_days: f64,
    pub delivered_shipments: i64,
    pub computed_at: DateTime<Utc>,
}

/// History row appended on every risk computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierMetrics {
    pub metric_id: i64,
    pub supplier_id: i64,
    pub record_date: NaiveDate,
    pub on_time_rate: f64,
    pub avg_delay_days: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub delivered_shipments: i64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSupplier {
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub rating: f64,
}

impl NewSupplier {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        if !(0.0..=5.0).contains(&self.rating) {
            return Err(CoreError::validation("rating must be between 0 and 5"));
        }
        Ok(())
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub warehouse_id: i64,
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewWarehouse {
    pub name: String,
    pub location: Option<String>,
}

impl NewWarehouse {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub supplier_id: i64,
    pub supplier_name: Option<String>,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit_cost: f64,
    pub lead_time_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub supplier_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub unit_cost: f64,
    pub lead_time_days: i64,
}

impl NewProduct {
    pub fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        if self.unit_cost < 0.0 {
            return Err(CoreError::validation("unit_cost must not be negative"));
        }
        if self.lead_time_days < 0 {
            return Err(CoreError::validation("lead_time_days must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub inventory_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub warehouse_name: Option<String>,
    pub quantity: i64,
    pub reorder_threshold: i64,
    pub safety_stock: i64,
    pub last_updated: DateTime<Utc>,
}

impl Inventory {
    /// Stock health: below safety stock is critical, below the reorder
    /// threshold is low.
    pub fn status(&self) -> InventoryStatus {
        if self.quantity < self.safety_stock {
            InventoryStatus::Critical
        } else if self.quantity < self.reorder_threshold {
            InventoryStatus::Low
        } else {
            InventoryStatus::Ok
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInventory {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub reorder_threshold: i64,
    pub safety_stock: i64,
}

impl NewInventory {
    pub fn validate(&self) -> Result<()> {
        if self.quantity < 0 || self.reorder_threshold < 0 || self.safety_stock < 0 {
            return Err(CoreError::validation(
                "quantity, reorder_threshold and safety_stock must not be negative",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Shipments
// =============================================================================

/// Whole days past `expected`, measured against the actual arrival when
/// known and `today` otherwise. Never negative.
pub fn delay_days(expected: NaiveDate, actual: Option<NaiveDate>, today: NaiveDate) -> i64 {
    let reference = actual.unwrap_or(today);
    (reference - expected).num_days().max(0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: i64,
    pub supplier_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub ship_date: NaiveDate,
    pub expected_arrival_date: NaiveDate,
    pub actual_arrival_date: Option<NaiveDate>,
    pub status: ShipmentStatus,
}

impl Shipment {
    /// A shipment counts as delivered once its arrival date is recorded.
    pub fn is_delivered(&self) -> bool {
        self.actual_arrival_date.is_some()
    }

    pub fn delay_days(&self, today: NaiveDate) -> i64 {
        delay_days(self.expected_arrival_date, self.actual_arrival_date, today)
    }

    /// `Some(true)` when delivered on or before the expected date, `None`
    /// while still in flight.
    pub fn arrived_on_time(&self) -> Option<bool> {
        self.actual_arrival_date
            .map(|actual| actual <= self.expected_arrival_date)
    }
}

/// A shipment joined with the names of the records it references.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentListing {
    pub shipment: Shipment,
    pub supplier_name: Option<String>,
    pub product_name: Option<String>,
    pub warehouse_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub event_id: i64,
    pub shipment_id: i64,
    pub event_time: DateTime<Utc>,
    pub event_type: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewShipment {
    pub supplier_id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub quantity: i64,
    pub ship_date: NaiveDate,
    pub expected_arrival_date: NaiveDate,
    pub status: ShipmentStatus,
}

impl NewShipment {
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(CoreError::validation("quantity must be positive"));
        }
        if self.expected_arrival_date < self.ship_date {
            return Err(CoreError::validation(
                "expected_arrival_date must not be before ship_date",
            ));
        }
        Ok(())
    }
}

/// Partial update applied by delivery confirmations and status changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentUpdate {
    pub status: Option<ShipmentStatus>,
    pub actual_arrival_date: Option<NaiveDate>,
    pub expected_arrival_date: Option<NaiveDate>,
    pub quantity: Option<i64>,
}

impl ShipmentUpdate {
    pub fn validate(&self) -> Result<()> {
        if matches!(self.quantity, Some(q) if q <= 0) {
            return Err(CoreError::validation("quantity must be positive"));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// Alerts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: i64,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        !self.resolved
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: Severity,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub message: String,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CoreError::validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn shipment(expected: &str, actual: Option<&str>) -> Shipment {
        Shipment {
            shipment_id: 1,
            supplier_id: 1,
            product_id: 1,
            warehouse_id: 1,
            quantity: 10,
            ship_date: date("2024-01-01"),
            expected_arrival_date: date(expected),
            actual_arrival_date: actual.map(date),
            status: ShipmentStatus::InTransit,
        }
    }

    #[test]
    fn test_delay_days_undelivered_counts_against_today() {
        let s = shipment("2024-01-10", None);
        assert_eq!(s.delay_days(date("2024-01-15")), 5);
        assert_eq!(s.arrived_on_time(), None);
    }

    #[test]
    fn test_delay_days_never_negative() {
        let early = shipment("2024-01-10", Some("2024-01-08"));
        assert_eq!(early.delay_days(date("2024-03-01")), 0);
        assert_eq!(early.arrived_on_time(), Some(true));

        let pending = shipment("2024-01-10", None);
        assert_eq!(pending.delay_days(date("2024-01-02")), 0);
    }

    #[test]
    fn test_delay_days_delivered_uses_actual_date() {
        let late = shipment("2024-01-10", Some("2024-01-13"));
        assert_eq!(late.delay_days(date("2024-06-01")), 3);
        assert_eq!(late.arrived_on_time(), Some(false));
    }

    #[test]
    fn test_enum_parsing_accepts_legacy_spellings() {
        assert_eq!("WARN".parse::<Severity>().unwrap(), Severity::Warning);
        assert_eq!(
            "shipment_delay".parse::<AlertType>().unwrap(),
            AlertType::ShipmentDelayed
        );
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("SOMETIMES".parse::<ShipmentStatus>().is_err());

        let severity: Severity = serde_json::from_str("\"WARN\"").unwrap();
        assert_eq!(severity, Severity::Warning);
        assert_eq!(
            serde_json::to_string(&ShipmentStatus::InTransit).unwrap(),
            "\"IN_TRANSIT\""
        );
    }

    #[test]
    fn test_inventory_status_thresholds() {
        let mut row = Inventory {
            inventory_id: 1,
            product_id: 1,
            warehouse_id: 1,
            product_name: None,
            sku: None,
            warehouse_name: None,
            quantity: 50,
            reorder_threshold: 40,
            safety_stock: 10,
            last_updated: Utc::now(),
        };
        assert_eq!(row.status(), InventoryStatus::Ok);
        row.quantity = 20;
        assert_eq!(row.status(), InventoryStatus::Low);
        row.quantity = 5;
        assert_eq!(row.status(), InventoryStatus::Critical);
    }

    #[test]
    fn test_validation() {
        let supplier = NewSupplier {
            name: "  ".into(),
            contact_email: None,
            phone: None,
            rating: 3.0,
        };
        assert!(matches!(supplier.validate(), Err(CoreError::Validation(_))));

        let shipment = NewShipment {
            supplier_id: 1,
            product_id: 1,
            warehouse_id: 1,
            quantity: 0,
            ship_date: date("2024-01-01"),
            expected_arrival_date: date("2024-01-05"),
            status: ShipmentStatus::Created,
        };
        assert!(shipment.validate().is_err());
    }
}
