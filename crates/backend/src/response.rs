// =============================================================================
// SCRI Backend - Response Envelope & Extractors
// =============================================================================
// Every route answers with `{success, data?, message?, error?}`. Bodies and
// path parameters go through extractors whose rejections render the same
// envelope instead of axum's plain-text errors.
// =============================================================================

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// -----------------------------------------------------------------------------
// Envelope
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

// -----------------------------------------------------------------------------
// Extractors
// -----------------------------------------------------------------------------

/// JSON body whose parse failures become 400 envelopes.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose parse failures become 400 envelopes.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// -----------------------------------------------------------------------------
// Form value helpers
// -----------------------------------------------------------------------------

/// A number as sent by a JSON client or an HTML form (`4.5` or `"4.5"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn to_f64(&self, field: &str) -> Result<f64, ApiError> {
        let value = match self {
            Numeric::Number(n) => *n,
            Numeric::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| ApiError::BadRequest(format!("{field} must be a number")))?,
        };
        if !value.is_finite() {
            return Err(ApiError::BadRequest(format!("{field} must be a number")));
        }
        Ok(value)
    }

    pub fn to_i64(&self, field: &str) -> Result<i64, ApiError> {
        let value = self.to_f64(field)?;
        if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
            return Err(ApiError::BadRequest(format!("{field} must be a whole number")));
        }
        Ok(value as i64)
    }
}

/// Required numeric field.
pub fn require_i64(field: &str, value: Option<&Numeric>) -> Result<i64, ApiError> {
    value
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))?
        .to_i64(field)
}

/// Optional numeric field; empty form strings count as absent.
pub fn optional_f64(field: &str, value: Option<&Numeric>) -> Result<Option<f64>, ApiError> {
    match value {
        None => Ok(None),
        Some(Numeric::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(n) => n.to_f64(field).map(Some),
    }
}

pub fn optional_i64(field: &str, value: Option<&Numeric>) -> Result<Option<i64>, ApiError> {
    match value {
        None => Ok(None),
        Some(Numeric::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(n) => n.to_i64(field).map(Some),
    }
}

/// `YYYY-MM-DD`
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be a YYYY-MM-DD date")))
}

pub fn require_date(field: &str, value: Option<&str>) -> Result<NaiveDate, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(field, v),
        _ => Err(ApiError::BadRequest(format!("{field} is required"))),
    }
}

pub fn optional_date(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_date(field, v).map(Some),
        _ => Ok(None),
    }
}

/// Blank strings from forms become `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accepts_numbers_and_strings() {
        let from_number: Numeric = serde_json::from_str("4.5").unwrap();
        let from_text: Numeric = serde_json::from_str("\" 4.5 \"").unwrap();
        assert_eq!(from_number.to_f64("rating").unwrap(), 4.5);
        assert_eq!(from_text.to_f64("rating").unwrap(), 4.5);

        let bad: Numeric = serde_json::from_str("\"four\"").unwrap();
        assert!(bad.to_f64("rating").is_err());
    }

    #[test]
    fn test_whole_numbers() {
        assert_eq!(Numeric::Text("12".into()).to_i64("quantity").unwrap(), 12);
        assert!(Numeric::Number(1.5).to_i64("quantity").is_err());
        assert!(require_i64("supplier_id", None).is_err());
        assert_eq!(optional_i64("lead", Some(&Numeric::Text("".into()))).unwrap(), None);
    }

    #[test]
    fn test_dates() {
        assert_eq!(
            require_date("ship_date", Some("2024-01-10")).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
        );
        assert!(require_date("ship_date", Some("10/01/2024")).is_err());
        assert!(require_date("ship_date", Some("  ")).is_err());
        assert_eq!(optional_date("actual_arrival_date", None).unwrap(), None);
    }

    #[test]
    fn test_envelope_skips_absent_fields() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": [1, 2]}));

        let body = serde_json::to_value(ApiResponse::ok(1).with_message("done")).unwrap();
        assert_eq!(body["message"], "done");
    }
}
