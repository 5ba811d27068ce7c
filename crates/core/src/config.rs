//! Tunable coefficients for risk scoring and alert severity
//!
//! Every coefficient of the scoring formula lives here, none in `risk`.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::RiskLevel;

/// Risk scoring coefficients and level thresholds (0-100 scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Scores below this are LOW
    pub low_threshold: f64,
    /// Scores at or above this are HIGH
    pub high_threshold: f64,
    /// Weight of the late-delivery fraction
    pub late_weight: f64,
    /// Weight of the normalized average delay
    pub delay_weight: f64,
    /// Average delay (days) at which the delay term saturates
    pub delay_cap_days: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            low_threshold: 30.0,
            high_threshold: 70.0,
            late_weight: 0.6,
            delay_weight: 0.4,
            delay_cap_days: 10.0,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<()> {
        let coefficients = [
            ("low threshold", self.low_threshold),
            ("high threshold", self.high_threshold),
            ("late weight", self.late_weight),
            ("delay weight", self.delay_weight),
            ("delay cap", self.delay_cap_days),
        ];
        if let Some((name, _)) = coefficients.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CoreError::validation(format!("risk {name} must be a finite number")));
        }

        let in_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_range(self.low_threshold) || !in_range(self.high_threshold) {
            return Err(CoreError::validation("risk thresholds must lie within 0-100"));
        }
        if self.low_threshold >= self.high_threshold {
            return Err(CoreError::validation(
                "low risk threshold must be below the high threshold",
            ));
        }
        if self.late_weight < 0.0 || self.delay_weight < 0.0 {
            return Err(CoreError::validation("risk weights must not be negative"));
        }
        if self.delay_cap_days <= 0.0 {
            return Err(CoreError::validation("delay cap must be positive"));
        }
        Ok(())
    }

    /// Bucket a score. The only place a `RiskLevel` is derived.
    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.high_threshold {
            RiskLevel::High
        } else if score >= self.low_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Alert severity settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Delays up to this many days are WARNING, longer ones CRITICAL
    pub short_delay_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { short_delay_days: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let config = RiskConfig::default();
        assert_eq!(config.classify(0.0), RiskLevel::Low);
        assert_eq!(config.classify(29.99), RiskLevel::Low);
        assert_eq!(config.classify(30.0), RiskLevel::Medium);
        assert_eq!(config.classify(69.99), RiskLevel::Medium);
        assert_eq!(config.classify(70.0), RiskLevel::High);
        assert_eq!(config.classify(100.0), RiskLevel::High);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = RiskConfig {
            low_threshold: 80.0,
            high_threshold: 20.0,
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_coefficients() {
        let nan_weight = RiskConfig {
            late_weight: f64::NAN,
            ..RiskConfig::default()
        };
        assert_eq!(
            nan_weight.validate(),
            Err(CoreError::validation("risk late weight must be a finite number"))
        );

        let endless_cap = RiskConfig {
            delay_cap_days: f64::INFINITY,
            ..RiskConfig::default()
        };
        assert!(endless_cap.validate().is_err());

        let nan_threshold = RiskConfig {
            high_threshold: f64::NAN,
            ..RiskConfig::default()
        };
        assert!(nan_threshold.validate().is_err());
    }
}
