//! Error types for the SCRI core
//!
//! ## Table of Contents
//! - **CoreError**: failures surfaced by the engines and the store
//! - **Result**: Type alias for `Result<T, CoreError>`

use thiserror::Error;

use crate::model::{AlertType, EntityType};

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Main error type for the risk, alert and aggregation engines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Unknown id for the named entity
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// Malformed create/update payload
    #[error("validation error: {0}")]
    Validation(String),

    /// Resolve called on an alert that is already resolved
    #[error("alert {0} is already resolved")]
    AlreadyResolved(i64),

    /// An open alert already exists for the tuple
    #[error("an open {alert_type} alert already exists for {entity_type} {entity_id}")]
    DuplicateOpenAlert {
        entity_type: EntityType,
        entity_id: i64,
        alert_type: AlertType,
    },

    /// Store collaborator failure
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CoreError {
    /// Create a not-found error
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// True for the two conflict cases (duplicate alert, already resolved)
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyResolved(_) | Self::DuplicateOpenAlert { .. }
        )
    }
}
