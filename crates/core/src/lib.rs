//! # SCRI Core
//!
//! Supplier risk classification, alert lifecycle and dashboard aggregation
//! for the supply-chain risk dashboard.
//!
//! ## Table of Contents
//! - **model**: suppliers, shipments, inventory, alerts and closed enums
//! - **risk**: on-time statistics, scoring, `RiskEngine`
//! - **alerts**: `AlertEngine` (raise with dedup, resolve, evaluation pass)
//! - **aggregate**: pure dashboard views and the `Dashboard` service
//! - **store**: `DataStore` trait and `MemoryStore`
//! - **config / clock / error**: coefficients, time source, `CoreError`
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scri_core::prelude::*;
//!
//! # async fn demo() -> scri_core::Result<()> {
//! let clock: Arc<dyn Clock> = Arc::new(SystemClock);
//! let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
//! let risk = RiskEngine::new(store.clone(), clock.clone(), RiskConfig::default());
//!
//! let assessment = risk.compute(1).await?;
//! println!("{} -> {}", assessment.risk.risk_score, assessment.risk.risk_level);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod alerts;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod risk;
pub mod store;

pub use error::{CoreError, Result};

/// Prelude for common imports
pub mod prelude {
    pub use crate::aggregate::{Dashboard, DashboardMetrics, ShipmentView, SupplierRiskRow};
    pub use crate::alerts::{AlertEngine, EvaluationSummary, RaiseOutcome};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::config::{AlertConfig, RiskConfig};
    pub use crate::error::{CoreError, Result};
    pub use crate::model::*;
    pub use crate::risk::{RiskAssessment, RiskEngine};
    pub use crate::store::{DataStore, MemoryStore, SavedRisk};
}
