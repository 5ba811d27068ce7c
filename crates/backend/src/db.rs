// =============================================================================
// SCRI Backend - Database Layer
// =============================================================================
// SQLite implementation of `DataStore`. Enum columns are TEXT and are parsed
// back into the closed core enums when rows are read.
// =============================================================================

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use scri_core::alerts::RaiseOutcome;
use scri_core::clock::{Clock, SystemClock};
use scri_core::model::{
    Alert, AlertType, EntityType, Inventory, NewAlert, NewInventory, NewProduct, NewShipment,
    NewSupplier, NewWarehouse, Product, RiskLevel, Shipment, ShipmentEvent, ShipmentListing,
    ShipmentUpdate, Supplier, SupplierMetrics, SupplierRisk, Warehouse,
};
use scri_core::store::{DataStore, SavedRisk};
use scri_core::{CoreError, Result};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite, SqliteConnection};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    clock: Arc<dyn Clock>,
}

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SupplierRow {
    supplier_id: i64,
    name: String,
    contact_email: Option<String>,
    phone: Option<String>,
    rating: f64,
    created_at: DateTime<Utc>,
    risk_score: Option<f64>,
    risk_level: Option<String>,
    on_time_rate: Option<f64>,
    avg_delay_days: Option<f64>,
    delivered_shipments: Option<i64>,
    risk_computed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SupplierRow> for Supplier {
    type Error = CoreError;

    fn try_from(row: SupplierRow) -> Result<Self> {
        let risk = match (row.risk_score, row.risk_level, row.risk_computed_at) {
            (Some(risk_score), Some(level), Some(computed_at)) => Some(SupplierRisk {
                risk_score,
                risk_level: parse_column("risk_level", &level)?,
                on_time_rate: row.on_time_rate.unwrap_or(1.0),
                avg_delay_days: row.avg_delay_days.unwrap_or(0.0),
                delivered_shipments: row.delivered_shipments.unwrap_or(0),
                computed_at,
            }),
            _ => None,
        };
        Ok(Supplier {
            supplier_id: row.supplier_id,
            name: row.name,
            contact_email: row.contact_email,
            phone: row.phone,
            rating: row.rating,
            created_at: row.created_at,
            risk,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MetricsRow {
    metric_id: i64,
    supplier_id: i64,
    record_date: NaiveDate,
    on_time_rate: f64,
    avg_delay_days: f64,
    risk_score: f64,
    risk_level: String,
    delivered_shipments: i64,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<MetricsRow> for SupplierMetrics {
    type Error = CoreError;

    fn try_from(row: MetricsRow) -> Result<Self> {
        Ok(SupplierMetrics {
            metric_id: row.metric_id,
            supplier_id: row.supplier_id,
            record_date: row.record_date,
            on_time_rate: row.on_time_rate,
            avg_delay_days: row.avg_delay_days,
            risk_score: row.risk_score,
            risk_level: parse_column("risk_level", &row.risk_level)?,
            delivered_shipments: row.delivered_shipments,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WarehouseRow {
    warehouse_id: i64,
    name: String,
    location: Option<String>,
}

impl From<WarehouseRow> for Warehouse {
    fn from(row: WarehouseRow) -> Self {
        Self {
            warehouse_id: row.warehouse_id,
            name: row.name,
            location: row.location,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    product_id: i64,
    supplier_id: i64,
    supplier_name: Option<String>,
    name: String,
    sku: Option<String>,
    category: Option<String>,
    unit_cost: f64,
    lead_time_days: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            product_id: row.product_id,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            name: row.name,
            sku: row.sku,
            category: row.category,
            unit_cost: row.unit_cost,
            lead_time_days: row.lead_time_days,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InventoryRow {
    inventory_id: i64,
    product_id: i64,
    warehouse_id: i64,
    product_name: Option<String>,
    sku: Option<String>,
    warehouse_name: Option<String>,
    quantity: i64,
    reorder_threshold: i64,
    safety_stock: i64,
    last_updated: DateTime<Utc>,
}

impl From<InventoryRow> for Inventory {
    fn from(row: InventoryRow) -> Self {
        Self {
            inventory_id: row.inventory_id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            product_name: row.product_name,
            sku: row.sku,
            warehouse_name: row.warehouse_name,
            quantity: row.quantity,
            reorder_threshold: row.reorder_threshold,
            safety_stock: row.safety_stock,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentRow {
    shipment_id: i64,
    supplier_id: i64,
    product_id: i64,
    warehouse_id: i64,
    quantity: i64,
    ship_date: NaiveDate,
    expected_arrival_date: NaiveDate,
    actual_arrival_date: Option<NaiveDate>,
    status: String,
}

impl TryFrom<ShipmentRow> for Shipment {
    type Error = CoreError;

    fn try_from(row: ShipmentRow) -> Result<Self> {
        Ok(Shipment {
            shipment_id: row.shipment_id,
            supplier_id: row.supplier_id,
            product_id: row.product_id,
            warehouse_id: row.warehouse_id,
            quantity: row.quantity,
            ship_date: row.ship_date,
            expected_arrival_date: row.expected_arrival_date,
            actual_arrival_date: row.actual_arrival_date,
            status: parse_column("status", &row.status)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShipmentListingRow {
    #[sqlx(flatten)]
    shipment: ShipmentRow,
    supplier_name: Option<String>,
    product_name: Option<String>,
    warehouse_name: Option<String>,
}

impl TryFrom<ShipmentListingRow> for ShipmentListing {
    type Error = CoreError;

    fn try_from(row: ShipmentListingRow) -> Result<Self> {
        Ok(ShipmentListing {
            shipment: row.shipment.try_into()?,
            supplier_name: row.supplier_name,
            product_name: row.product_name,
            warehouse_name: row.warehouse_name,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: i64,
    shipment_id: i64,
    event_time: DateTime<Utc>,
    event_type: String,
    details: Option<String>,
}

impl From<EventRow> for ShipmentEvent {
    fn from(row: EventRow) -> Self {
        Self {
            event_id: row.event_id,
            shipment_id: row.shipment_id,
            event_time: row.event_time,
            event_type: row.event_type,
            details: row.details,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    alert_id: i64,
    alert_type: String,
    severity: String,
    entity_type: String,
    entity_id: i64,
    message: String,
    created_at: DateTime<Utc>,
    resolved: bool,
    resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = CoreError;

    fn try_from(row: AlertRow) -> Result<Self> {
        Ok(Alert {
            alert_id: row.alert_id,
            alert_type: parse_column("alert_type", &row.alert_type)?,
            severity: parse_column("severity", &row.severity)?,
            entity_type: parse_column("entity_type", &row.entity_type)?,
            entity_id: row.entity_id,
            message: row.message,
            created_at: row.created_at,
            resolved: row.resolved,
            resolved_at: row.resolved_at,
        })
    }
}

fn parse_column<T>(column: &str, raw: &str) -> Result<T>
where
    T: FromStr<Err = CoreError>,
{
    raw.parse()
        .map_err(|_| CoreError::store(format!("unexpected {column} value '{raw}' in database")))
}

fn collect<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = CoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Map a driver error onto the core taxonomy.
fn store_err(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            CoreError::validation("referenced record does not exist")
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            CoreError::store(format!("connection pool: {err}"))
        }
        _ => CoreError::store(err.to_string()),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn open_alert(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
    entity_id: i64,
    alert_type: AlertType,
) -> Result<Option<Alert>> {
    let sql = format!(
        "{ALERT_COLUMNS} WHERE entity_type = ? AND entity_id = ? AND alert_type = ? AND resolved = 0"
    );
    sqlx::query_as::<_, AlertRow>(&sql)
        .bind(entity_type.as_str())
        .bind(entity_id)
        .bind(alert_type.as_str())
        .fetch_optional(conn)
        .await
        .map_err(store_err)?
        .map(Alert::try_from)
        .transpose()
}

/// Insert an open alert. `idx_alerts_open_unique` turns a second open alert
/// for the same tuple into `DuplicateOpenAlert`.
async fn insert_alert(
    conn: &mut SqliteConnection,
    alert: &NewAlert,
    created_at: DateTime<Utc>,
) -> Result<Alert> {
    let inserted = sqlx::query_as::<_, AlertRow>(
        r#"
        INSERT INTO alerts (alert_type, severity, entity_type, entity_id, message, created_at, resolved)
        VALUES (?, ?, ?, ?, ?, ?, 0)
        RETURNING alert_id, alert_type, severity, entity_type, entity_id, message,
                  created_at, resolved, resolved_at
        "#,
    )
    .bind(alert.alert_type.as_str())
    .bind(alert.severity.as_str())
    .bind(alert.entity_type.as_str())
    .bind(alert.entity_id)
    .bind(&alert.message)
    .bind(created_at)
    .fetch_one(conn)
    .await;

    match inserted {
        Ok(row) => Alert::try_from(row),
        Err(err) if is_unique_violation(&err) => Err(CoreError::DuplicateOpenAlert {
            entity_type: alert.entity_type,
            entity_id: alert.entity_id,
            alert_type: alert.alert_type,
        }),
        Err(err) => Err(store_err(err)),
    }
}

// =============================================================================
// Queries
// =============================================================================

const SUPPLIER_COLUMNS: &str = r#"
    SELECT supplier_id, name, contact_email, phone, rating, created_at,
           risk_score, risk_level, on_time_rate, avg_delay_days,
           delivered_shipments, risk_computed_at
    FROM suppliers
"#;

const PRODUCT_COLUMNS: &str = r#"
    SELECT p.product_id, p.supplier_id, s.name AS supplier_name, p.name, p.sku,
           p.category, p.unit_cost, p.lead_time_days
    FROM products p
    LEFT JOIN suppliers s ON s.supplier_id = p.supplier_id
"#;

const INVENTORY_COLUMNS: &str = r#"
    SELECT i.inventory_id, i.product_id, i.warehouse_id, p.name AS product_name, p.sku,
           w.name AS warehouse_name, i.quantity, i.reorder_threshold, i.safety_stock,
           i.last_updated
    FROM inventory i
    LEFT JOIN products p ON p.product_id = i.product_id
    LEFT JOIN warehouses w ON w.warehouse_id = i.warehouse_id
"#;

const SHIPMENT_COLUMNS: &str = r#"
    SELECT shipment_id, supplier_id, product_id, warehouse_id, quantity, ship_date,
           expected_arrival_date, actual_arrival_date, status
    FROM shipments
"#;

const ALERT_COLUMNS: &str = r#"
    SELECT alert_id, alert_type, severity, entity_type, entity_id, message,
           created_at, resolved, resolved_at
    FROM alerts
"#;

impl Database {
    /// Create a new database connection pool.
    pub async fn new(url: &str) -> std::result::Result<Self, sqlx::Error> {
        Self::with_clock(url, Arc::new(SystemClock)).await
    }

    /// Pool whose record timestamps come from `clock`.
    pub async fn with_clock(
        url: &str,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, sqlx::Error> {
        let in_memory = url.contains(":memory:");

        // Add create_if_missing option for SQLite files
        let url_with_options = if in_memory || !url.starts_with("sqlite:") {
            url.to_string()
        } else if !url.contains('?') {
            format!("{}?mode=rwc", url)
        } else if !url.contains("mode=") {
            format!("{}&mode=rwc", url)
        } else {
            url.to_string()
        };

        // An in-memory database lives only as long as its one connection
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(&url_with_options).await?;
        Ok(Self { pool, clock })
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::Error> {
        // Suppliers; risk columns stay NULL until the first computation
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS suppliers (
                supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                contact_email TEXT,
                phone TEXT,
                rating REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                risk_score REAL,
                risk_level TEXT,
                previous_risk_level TEXT,
                on_time_rate REAL,
                avg_delay_days REAL,
                delivered_shipments INTEGER,
                risk_computed_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Supplier metrics history
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS supplier_metrics (
                metric_id INTEGER PRIMARY KEY AUTOINCREMENT,
                supplier_id INTEGER NOT NULL REFERENCES suppliers(supplier_id),
                record_date TEXT NOT NULL,
                on_time_rate REAL NOT NULL,
                avg_delay_days REAL NOT NULL,
                risk_score REAL NOT NULL,
                risk_level TEXT NOT NULL,
                delivered_shipments INTEGER NOT NULL DEFAULT 0,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Warehouses
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warehouses (
                warehouse_id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                location TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Products
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                product_id INTEGER PRIMARY KEY AUTOINCREMENT,
                supplier_id INTEGER NOT NULL REFERENCES suppliers(supplier_id),
                name TEXT NOT NULL,
                sku TEXT,
                category TEXT,
                unit_cost REAL NOT NULL DEFAULT 0,
                lead_time_days INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Inventory, one row per (product, warehouse)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS inventory (
                inventory_id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(product_id),
                warehouse_id INTEGER NOT NULL REFERENCES warehouses(warehouse_id),
                quantity INTEGER NOT NULL DEFAULT 0,
                reorder_threshold INTEGER NOT NULL DEFAULT 0,
                safety_stock INTEGER NOT NULL DEFAULT 0,
                last_updated TEXT NOT NULL,
                UNIQUE(product_id, warehouse_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Shipments
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shipments (
                shipment_id INTEGER PRIMARY KEY AUTOINCREMENT,
                supplier_id INTEGER NOT NULL REFERENCES suppliers(supplier_id),
                product_id INTEGER NOT NULL REFERENCES products(product_id),
                warehouse_id INTEGER NOT NULL REFERENCES warehouses(warehouse_id),
                quantity INTEGER NOT NULL,
                ship_date TEXT NOT NULL,
                expected_arrival_date TEXT NOT NULL,
                actual_arrival_date TEXT,
                status TEXT NOT NULL DEFAULT 'CREATED'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Shipment events
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS shipment_events (
                event_id INTEGER PRIMARY KEY AUTOINCREMENT,
                shipment_id INTEGER NOT NULL REFERENCES shipments(shipment_id),
                event_time TEXT NOT NULL,
                event_type TEXT NOT NULL,
                details TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Alerts
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id INTEGER NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                resolved_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // At most one open alert per (entity, type)
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_open_unique
            ON alerts(entity_type, entity_id, alert_type)
            WHERE resolved = 0
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes for performance
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_shipments_supplier ON shipments(supplier_id)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_shipments_status ON shipments(status)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_shipment ON shipment_events(shipment_id)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_metrics_supplier ON supplier_metrics(supplier_id, recorded_at)")
            .execute(&self.pool)
            .await;
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_resolved ON alerts(resolved, created_at)")
            .execute(&self.pool)
            .await;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    async fn exists(&self, table: &'static str, column: &'static str, id: i64) -> Result<bool> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {column} = ?");
        let found = sqlx::query_scalar::<_, i64>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(found > 0)
    }

    async fn require(
        &self,
        entity: &'static str,
        table: &'static str,
        column: &'static str,
        id: i64,
    ) -> Result<()> {
        if self.exists(table, column, id).await? {
            Ok(())
        } else {
            Err(CoreError::not_found(entity, id))
        }
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let sql = format!("{PRODUCT_COLUMNS} WHERE p.product_id = ?");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Product::from))
    }

    async fn find_inventory(&self, id: i64) -> Result<Option<Inventory>> {
        let sql = format!("{INVENTORY_COLUMNS} WHERE i.inventory_id = ?");
        let row = sqlx::query_as::<_, InventoryRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Inventory::from))
    }

    async fn find_alert(&self, id: i64) -> Result<Option<Alert>> {
        let sql = format!("{ALERT_COLUMNS} WHERE alert_id = ?");
        sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(Alert::try_from)
            .transpose()
    }

    async fn count(&self, sql: &str) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)
    }
}

// =============================================================================
// DataStore
// =============================================================================

#[async_trait]
impl DataStore for Database {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Suppliers
    // -------------------------------------------------------------------------

    async fn get_supplier(&self, id: i64) -> Result<Option<Supplier>> {
        let sql = format!("{SUPPLIER_COLUMNS} WHERE supplier_id = ?");
        sqlx::query_as::<_, SupplierRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(Supplier::try_from)
            .transpose()
    }

    async fn list_suppliers(&self) -> Result<Vec<Supplier>> {
        let sql = format!("{SUPPLIER_COLUMNS} ORDER BY supplier_id");
        let rows = sqlx::query_as::<_, SupplierRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        collect(rows)
    }

    async fn create_supplier(&self, supplier: &NewSupplier) -> Result<Supplier> {
        let id = sqlx::query(
            r#"
            INSERT INTO suppliers (name, contact_email, phone, rating, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&supplier.name)
        .bind(&supplier.contact_email)
        .bind(&supplier.phone)
        .bind(supplier.rating)
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        self.get_supplier(id)
            .await?
            .ok_or_else(|| CoreError::not_found("supplier", id))
    }

    async fn update_supplier(&self, id: i64, supplier: &NewSupplier) -> Result<Supplier> {
        let result = sqlx::query(
            r#"
            UPDATE suppliers
            SET name = ?, contact_email = ?, phone = ?, rating = ?
            WHERE supplier_id = ?
            "#,
        )
        .bind(&supplier.name)
        .bind(&supplier.contact_email)
        .bind(&supplier.phone)
        .bind(supplier.rating)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("supplier", id));
        }
        self.get_supplier(id)
            .await?
            .ok_or_else(|| CoreError::not_found("supplier", id))
    }

    async fn list_shipments_for_supplier(&self, id: i64) -> Result<Vec<Shipment>> {
        let sql = format!("{SHIPMENT_COLUMNS} WHERE supplier_id = ? ORDER BY shipment_id");
        let rows = sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        collect(rows)
    }

    async fn save_supplier_risk(
        &self,
        id: i64,
        risk: &SupplierRisk,
        escalation: Option<&NewAlert>,
    ) -> Result<SavedRisk> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        // The SET list reads pre-update values, so previous_risk_level
        // captures the level being replaced.
        let previous = sqlx::query_scalar::<_, Option<String>>(
            r#"
            UPDATE suppliers
            SET previous_risk_level = risk_level,
                risk_score = ?,
                risk_level = ?,
                on_time_rate = ?,
                avg_delay_days = ?,
                delivered_shipments = ?,
                risk_computed_at = ?
            WHERE supplier_id = ?
            RETURNING previous_risk_level
            "#,
        )
        .bind(risk.risk_score)
        .bind(risk.risk_level.as_str())
        .bind(risk.on_time_rate)
        .bind(risk.avg_delay_days)
        .bind(risk.delivered_shipments)
        .bind(risk.computed_at)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;

        let previous_level = previous
            .ok_or_else(|| CoreError::not_found("supplier", id))?
            .map(|level| parse_column::<RiskLevel>("previous_risk_level", &level))
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO supplier_metrics
                (supplier_id, record_date, on_time_rate, avg_delay_days, risk_score,
                 risk_level, delivered_shipments, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(risk.computed_at.date_naive())
        .bind(risk.on_time_rate)
        .bind(risk.avg_delay_days)
        .bind(risk.risk_score)
        .bind(risk.risk_level.as_str())
        .bind(risk.delivered_shipments)
        .bind(risk.computed_at)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        // The UPDATE above holds the write lock, so the dedup check and the
        // insert cannot interleave with another writer.
        let escalation = match escalation {
            Some(alert) if previous_level != Some(RiskLevel::High) => {
                let open =
                    open_alert(&mut tx, alert.entity_type, alert.entity_id, alert.alert_type)
                        .await?;
                Some(match open {
                    Some(existing) => RaiseOutcome::AlreadyOpen(existing),
                    None => RaiseOutcome::Raised(
                        insert_alert(&mut tx, alert, risk.computed_at).await?,
                    ),
                })
            }
            _ => None,
        };

        tx.commit().await.map_err(store_err)?;

        Ok(SavedRisk {
            previous_level,
            escalation,
        })
    }

    async fn list_supplier_metrics(&self, id: i64, limit: u32) -> Result<Vec<SupplierMetrics>> {
        let rows = sqlx::query_as::<_, MetricsRow>(
            r#"
            SELECT metric_id, supplier_id, record_date, on_time_rate, avg_delay_days,
                   risk_score, risk_level, delivered_shipments, recorded_at
            FROM supplier_metrics
            WHERE supplier_id = ?
            ORDER BY recorded_at DESC, metric_id DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        collect(rows)
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    async fn list_products(&self) -> Result<Vec<Product>> {
        let sql = format!("{PRODUCT_COLUMNS} ORDER BY p.product_id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        self.require("supplier", "suppliers", "supplier_id", product.supplier_id)
            .await?;

        let id = sqlx::query(
            r#"
            INSERT INTO products (supplier_id, name, sku, category, unit_cost, lead_time_days)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(product.supplier_id)
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(product.unit_cost)
        .bind(product.lead_time_days)
        .execute(&self.pool)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        self.find_product(id)
            .await?
            .ok_or_else(|| CoreError::not_found("product", id))
    }

    async fn list_warehouses(&self) -> Result<Vec<Warehouse>> {
        let rows = sqlx::query_as::<_, WarehouseRow>(
            "SELECT warehouse_id, name, location FROM warehouses ORDER BY warehouse_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(Warehouse::from).collect())
    }

    async fn create_warehouse(&self, warehouse: &NewWarehouse) -> Result<Warehouse> {
        let id = sqlx::query("INSERT INTO warehouses (name, location) VALUES (?, ?)")
            .bind(&warehouse.name)
            .bind(&warehouse.location)
            .execute(&self.pool)
            .await
            .map_err(store_err)?
            .last_insert_rowid();

        Ok(Warehouse {
            warehouse_id: id,
            name: warehouse.name.clone(),
            location: warehouse.location.clone(),
        })
    }

    async fn list_inventory(&self) -> Result<Vec<Inventory>> {
        let sql = format!("{INVENTORY_COLUMNS} ORDER BY i.last_updated DESC, i.inventory_id DESC");
        let rows = sqlx::query_as::<_, InventoryRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(Inventory::from).collect())
    }

    async fn upsert_inventory(&self, inventory: &NewInventory) -> Result<Inventory> {
        self.require("product", "products", "product_id", inventory.product_id)
            .await?;
        self.require("warehouse", "warehouses", "warehouse_id", inventory.warehouse_id)
            .await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO inventory
                (product_id, warehouse_id, quantity, reorder_threshold, safety_stock, last_updated)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id, warehouse_id) DO UPDATE SET
                quantity = excluded.quantity,
                reorder_threshold = excluded.reorder_threshold,
                safety_stock = excluded.safety_stock,
                last_updated = excluded.last_updated
            RETURNING inventory_id
            "#,
        )
        .bind(inventory.product_id)
        .bind(inventory.warehouse_id)
        .bind(inventory.quantity)
        .bind(inventory.reorder_threshold)
        .bind(inventory.safety_stock)
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        self.find_inventory(id)
            .await?
            .ok_or_else(|| CoreError::not_found("inventory", id))
    }

    // -------------------------------------------------------------------------
    // Shipments
    // -------------------------------------------------------------------------

    async fn get_shipment(&self, id: i64) -> Result<Option<Shipment>> {
        let sql = format!("{SHIPMENT_COLUMNS} WHERE shipment_id = ?");
        sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(Shipment::try_from)
            .transpose()
    }

    async fn list_shipments(&self) -> Result<Vec<ShipmentListing>> {
        let rows = sqlx::query_as::<_, ShipmentListingRow>(
            r#"
            SELECT s.shipment_id, s.supplier_id, s.product_id, s.warehouse_id, s.quantity,
                   s.ship_date, s.expected_arrival_date, s.actual_arrival_date, s.status,
                   sup.name AS supplier_name, p.name AS product_name, w.name AS warehouse_name
            FROM shipments s
            LEFT JOIN suppliers sup ON sup.supplier_id = s.supplier_id
            LEFT JOIN products p ON p.product_id = s.product_id
            LEFT JOIN warehouses w ON w.warehouse_id = s.warehouse_id
            ORDER BY s.ship_date DESC, s.shipment_id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        collect(rows)
    }

    async fn create_shipment(&self, shipment: &NewShipment) -> Result<Shipment> {
        self.require("supplier", "suppliers", "supplier_id", shipment.supplier_id)
            .await?;
        self.require("product", "products", "product_id", shipment.product_id)
            .await?;
        self.require("warehouse", "warehouses", "warehouse_id", shipment.warehouse_id)
            .await?;

        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let id = sqlx::query(
            r#"
            INSERT INTO shipments
                (supplier_id, product_id, warehouse_id, quantity, ship_date,
                 expected_arrival_date, status)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(shipment.supplier_id)
        .bind(shipment.product_id)
        .bind(shipment.warehouse_id)
        .bind(shipment.quantity)
        .bind(shipment.ship_date)
        .bind(shipment.expected_arrival_date)
        .bind(shipment.status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO shipment_events (shipment_id, event_time, event_type, details) VALUES (?, ?, 'CREATED', 'created')",
        )
        .bind(id)
        .bind(self.clock.now())
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;
        tx.commit().await.map_err(store_err)?;

        self.get_shipment(id)
            .await?
            .ok_or_else(|| CoreError::not_found("shipment", id))
    }

    async fn update_shipment(&self, id: i64, update: &ShipmentUpdate) -> Result<Shipment> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let sql = format!("{SHIPMENT_COLUMNS} WHERE shipment_id = ?");
        let current: Shipment = sqlx::query_as::<_, ShipmentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?
            .ok_or_else(|| CoreError::not_found("shipment", id))?
            .try_into()?;

        let status = update.status.unwrap_or(current.status);
        let updated = Shipment {
            status,
            actual_arrival_date: update.actual_arrival_date.or(current.actual_arrival_date),
            expected_arrival_date: update
                .expected_arrival_date
                .unwrap_or(current.expected_arrival_date),
            quantity: update.quantity.unwrap_or(current.quantity),
            ..current.clone()
        };

        sqlx::query(
            r#"
            UPDATE shipments
            SET status = ?, actual_arrival_date = ?, expected_arrival_date = ?, quantity = ?
            WHERE shipment_id = ?
            "#,
        )
        .bind(updated.status.as_str())
        .bind(updated.actual_arrival_date)
        .bind(updated.expected_arrival_date)
        .bind(updated.quantity)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if status != current.status {
            sqlx::query(
                "INSERT INTO shipment_events (shipment_id, event_time, event_type, details) VALUES (?, ?, ?, 'status updated')",
            )
            .bind(id)
            .bind(self.clock.now())
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(updated)
    }

    async fn list_shipment_events(&self, id: i64) -> Result<Vec<ShipmentEvent>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT event_id, shipment_id, event_time, event_type, details
            FROM shipment_events
            WHERE shipment_id = ?
            ORDER BY event_time DESC, event_id DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().map(ShipmentEvent::from).collect())
    }

    // -------------------------------------------------------------------------
    // Alerts
    // -------------------------------------------------------------------------

    async fn create_alert(&self, alert: &NewAlert, created_at: DateTime<Utc>) -> Result<Alert> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        insert_alert(&mut conn, alert, created_at).await
    }

    async fn find_open_alert(
        &self,
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    ) -> Result<Option<Alert>> {
        let mut conn = self.pool.acquire().await.map_err(store_err)?;
        open_alert(&mut conn, entity_type, entity_id, alert_type).await
    }

    async fn resolve_alert(&self, id: i64, resolved_at: DateTime<Utc>) -> Result<Alert> {
        let result = sqlx::query(
            "UPDATE alerts SET resolved = 1, resolved_at = ? WHERE alert_id = ? AND resolved = 0",
        )
        .bind(resolved_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        let alert = self
            .find_alert(id)
            .await?
            .ok_or_else(|| CoreError::not_found("alert", id))?;
        if result.rows_affected() == 0 {
            return Err(CoreError::AlreadyResolved(id));
        }
        Ok(alert)
    }

    async fn list_alerts(&self, resolved: bool) -> Result<Vec<Alert>> {
        let sql =
            format!("{ALERT_COLUMNS} WHERE resolved = ? ORDER BY created_at DESC, alert_id DESC");
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(resolved)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        collect(rows)
    }

    // -------------------------------------------------------------------------
    // Counters
    // -------------------------------------------------------------------------

    async fn count_suppliers(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM suppliers").await
    }

    async fn count_in_transit_shipments(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM shipments WHERE status = 'IN_TRANSIT'")
            .await
    }

    async fn count_open_alerts(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM alerts WHERE resolved = 0").await
    }

    async fn count_critical_inventory(&self) -> Result<i64> {
        self.count("SELECT COUNT(*) FROM inventory WHERE quantity < safety_stock")
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================
