// =============================================================================
// SCRI Backend - Error Types
// =============================================================================

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scri_core::CoreError;
use serde_json::json;

/// API error type. Every variant renders as `{success: false, error}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::AlreadyResolved(_) | CoreError::DuplicateOpenAlert { .. } => {
                ApiError::Conflict(err.to_string())
            }
            CoreError::StoreUnavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::MethodNotAllowed(msg)
            | ApiError::Conflict(msg) => msg.clone(),
            ApiError::Timeout => {
                tracing::warn!("Request timed out");
                self.to_string()
            }
            ApiError::Unavailable(msg) => {
                tracing::error!("Store unavailable: {}", msg);
                "Data store unavailable".into()
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scri_core::model::{AlertType, EntityType};

    #[test]
    fn test_core_error_status_mapping() {
        let cases = [
            (CoreError::not_found("supplier", 9), StatusCode::NOT_FOUND),
            (CoreError::validation("name is required"), StatusCode::BAD_REQUEST),
            (CoreError::AlreadyResolved(3), StatusCode::CONFLICT),
            (
                CoreError::DuplicateOpenAlert {
                    entity_type: EntityType::Shipment,
                    entity_id: 1,
                    alert_type: AlertType::ShipmentDelayed,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::store("pool closed"), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_validation_message_passes_through() {
        match ApiError::from(CoreError::validation("rating must be between 0 and 5")) {
            ApiError::BadRequest(msg) => assert_eq!(msg, "rating must be between 0 and 5"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
