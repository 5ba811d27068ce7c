// =============================================================================
// SCRI Backend - Alerts API
// =============================================================================
// Listing, manual creation, resolution, demo generation and the evaluation
// pass. All creation goes through the engine so open alerts stay unique.
// =============================================================================

use axum::{extract::State, http::StatusCode};
use scri_core::alerts::{EvaluationSummary, RaiseOutcome};
use scri_core::model::{Alert, AlertType, EntityType, NewAlert, Severity};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::response::{
    optional_i64, ApiJson, ApiPath, ApiQuery, ApiResponse, ApiResult, Numeric,
};
use crate::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    pub resolved: Option<String>,
}

impl AlertsQuery {
    fn resolved(&self) -> Result<bool, ApiError> {
        match self.resolved.as_deref().map(str::trim) {
            None | Some("") => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
            Some(v) => Err(ApiError::BadRequest(format!(
                "resolved must be true or false, got '{v}'"
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateAlertRequest {
    pub alert_type: Option<String>,
    pub severity: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<Numeric>,
    pub message: Option<String>,
}

impl CreateAlertRequest {
    fn into_new(self) -> Result<NewAlert, ApiError> {
        Ok(NewAlert {
            alert_type: parse_or(self.alert_type.as_deref(), AlertType::Custom)?,
            severity: parse_or(self.severity.as_deref(), Severity::Info)?,
            entity_type: parse_or(self.entity_type.as_deref(), EntityType::System)?,
            entity_id: optional_i64("entity_id", self.entity_id.as_ref())?.unwrap_or(0),
            message: self
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Custom alert".to_string()),
        })
    }
}

fn parse_or<T>(raw: Option<&str>, default: T) -> Result<T, ApiError>
where
    T: std::str::FromStr<Err = scri_core::CoreError>,
{
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(s.parse()?),
        _ => Ok(default),
    }
}

#[derive(Debug, Serialize)]
pub struct TestAlertsResponse {
    pub alerts: Vec<&'static str>,
}

// =============================================================================
// Handlers
// =============================================================================

/// `?resolved=true` lists history; the default is open alerts.
pub async fn list_alerts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AlertsQuery>,
) -> ApiResult<Vec<Alert>> {
    let alerts = state.alerts.list(query.resolved()?).await?;
    Ok(ApiResponse::ok(alerts))
}

pub async fn create_alert(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateAlertRequest>,
) -> Result<(StatusCode, ApiResponse<RaiseOutcome>), ApiError> {
    let outcome = state.alerts.raise(req.into_new()?).await?;
    let (status, message) = if outcome.is_new() {
        (StatusCode::CREATED, "Alert created successfully")
    } else {
        (StatusCode::OK, "An open alert already exists for this entity")
    };
    Ok((status, ApiResponse::ok(outcome).with_message(message)))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Alert> {
    let alert = state.alerts.resolve(id).await?;
    Ok(ApiResponse::ok(alert).with_message("Alert resolved successfully"))
}

pub async fn generate_test_alerts(State(state): State<AppState>) -> ApiResult<TestAlertsResponse> {
    let alerts = state.alerts.generate_test_alerts().await?;
    let message = format!("Created {} test alerts", alerts.len());
    Ok(ApiResponse::ok(TestAlertsResponse { alerts }).with_message(message))
}

pub async fn evaluate_alerts(State(state): State<AppState>) -> ApiResult<EvaluationSummary> {
    let summary = state.alerts.evaluate_all().await?;
    let message = format!("Raised {} new alerts", summary.raised);
    Ok(ApiResponse::ok(summary).with_message(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_alert_defaults() {
        let alert = CreateAlertRequest::default().into_new().unwrap();
        assert_eq!(alert.alert_type, AlertType::Custom);
        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.entity_type, EntityType::System);
        assert_eq!(alert.entity_id, 0);
        assert_eq!(alert.message, "Custom alert");
    }

    #[test]
    fn test_manual_alert_accepts_legacy_spellings() {
        let alert = CreateAlertRequest {
            alert_type: Some("SHIPMENT_DELAY".into()),
            severity: Some("warn".into()),
            entity_type: Some("shipment".into()),
            entity_id: Some(Numeric::Text("12".into())),
            message: Some("late".into()),
        }
        .into_new()
        .unwrap();
        assert_eq!(alert.alert_type, AlertType::ShipmentDelayed);
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.entity_id, 12);
    }

    #[test]
    fn test_resolved_flag() {
        let flag = |v: Option<&str>| AlertsQuery { resolved: v.map(String::from) }.resolved();
        assert!(!flag(None).unwrap());
        assert!(flag(Some("true")).unwrap());
        assert!(flag(Some("1")).unwrap());
        assert!(!flag(Some("False")).unwrap());
        assert!(flag(Some("maybe")).is_err());
    }
}
