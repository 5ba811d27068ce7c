// =============================================================================
// SCRI Backend - API Server Entry Point
// =============================================================================
// Table of Contents:
// 1. Imports
// 2. Application State
// 3. Main Entry Point
// 4. Router Setup
// =============================================================================

mod alerts;
mod catalog;
mod config;
mod dashboard;
mod db;
mod error;
mod response;
mod shipments;
mod suppliers;
mod sweeper;

use axum::{
    http::{Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use scri_core::aggregate::Dashboard;
use scri_core::alerts::AlertEngine;
use scri_core::clock::{Clock, SystemClock};
use scri_core::config::{AlertConfig, RiskConfig};
use scri_core::risk::RiskEngine;
use scri_core::store::DataStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::error::ApiError;
use crate::sweeper::Sweeper;

// -----------------------------------------------------------------------------
// 2. Application State
// -----------------------------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub risk: Arc<RiskEngine>,
    pub alerts: AlertEngine,
    pub dashboard: Dashboard,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DataStore>,
        clock: Arc<dyn Clock>,
        risk: RiskConfig,
        alerts: AlertConfig,
    ) -> Self {
        let alert_engine = AlertEngine::new(store.clone(), clock.clone(), alerts);
        let risk_engine = RiskEngine::new(store.clone(), clock.clone(), risk);
        Self {
            dashboard: Dashboard::new(store.clone(), clock),
            risk: Arc::new(risk_engine),
            alerts: alert_engine,
            store,
        }
    }
}

// -----------------------------------------------------------------------------
// 3. Main Entry Point
// -----------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables, current directory first, then crates/backend/
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_filename("crates/backend/.env");
    }

    // Load configuration
    let config = Config::from_env()?;
    let bind_addr = config.bind_address.clone();

    // Ensure database directory exists for SQLite
    if config.database_url.starts_with("sqlite:") && !config.database_url.contains(":memory:") {
        let db_path = config.database_url.trim_start_matches("sqlite:");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    // Initialize database
    let db = Database::new(&config.database_url).await?;
    db.run_migrations().await?;

    // Create app state
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = AppState::new(
        Arc::new(db),
        clock,
        config.risk.clone(),
        config.alerts.clone(),
    );

    // Optional periodic alert evaluation
    let sweeper = config
        .alert_sweep_interval
        .map(|period| Sweeper::spawn(state.alerts.clone(), period));

    // Build router
    let app = create_router(state, config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("SCRI API Server running on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    tracing::info!("SCRI API Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

// -----------------------------------------------------------------------------
// 4. Router Setup
// -----------------------------------------------------------------------------

fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let routes = Router::new()
        // Health check
        .route("/api/health", get(dashboard::health))
        // Dashboard
        .route("/api/dashboard/metrics", get(dashboard::metrics))
        .route("/api/dashboard/supplier-risk", get(dashboard::supplier_risk))
        .route("/api/dashboard/delayed-shipments", get(dashboard::delayed_shipments))
        // Suppliers
        .route(
            "/api/suppliers",
            get(suppliers::list_suppliers).post(suppliers::create_supplier),
        )
        .route(
            "/api/suppliers/:id",
            get(suppliers::get_supplier).put(suppliers::update_supplier),
        )
        .route("/api/suppliers/:id/metrics", get(suppliers::supplier_metrics))
        .route("/api/suppliers/:id/compute-risk", post(suppliers::compute_risk))
        // Shipments
        .route(
            "/api/shipments",
            get(shipments::list_shipments).post(shipments::create_shipment),
        )
        .route("/api/shipments/:id", put(shipments::update_shipment))
        .route("/api/shipments/:id/events", get(shipments::shipment_events))
        // Catalog
        .route(
            "/api/warehouses",
            get(catalog::list_warehouses).post(catalog::create_warehouse),
        )
        .route(
            "/api/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/api/inventory",
            get(catalog::list_inventory).post(catalog::upsert_inventory),
        )
        // Alerts
        .route("/api/alerts", get(alerts::list_alerts).post(alerts::create_alert))
        .route("/api/alerts/generate-test", post(alerts::generate_test_alerts))
        .route("/api/alerts/evaluate", post(alerts::evaluate_alerts))
        .route("/api/alerts/:id/resolve", post(alerts::resolve_alert))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .with_state(state);

    with_middleware(routes, request_timeout)
}

fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(timeout_envelope))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{} is not supported on {}", method, uri.path()))
}

/// TimeoutLayer answers with a bare 408; handlers never produce one.
async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        ApiError::Timeout.into_response()
    } else {
        response
    }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
