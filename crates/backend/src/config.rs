// =============================================================================
// SCRI Backend - Configuration
// =============================================================================

use std::env;
use std::str::FromStr;
use std::time::Duration;

use scri_core::config::{AlertConfig, RiskConfig};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:4000")
    pub bind_address: String,

    /// Database URL (SQLite path)
    pub database_url: String,

    /// Upper bound on a single request
    pub request_timeout: Duration,

    /// Period of the background alert sweep; `None` disables it
    pub alert_sweep_interval: Option<Duration>,

    /// Risk scoring coefficients
    pub risk: RiskConfig,

    /// Alert severity settings
    pub alerts: AlertConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RiskConfig::default();
        let risk = RiskConfig {
            low_threshold: parse_or(&lookup, "RISK_LOW_THRESHOLD", defaults.low_threshold)?,
            high_threshold: parse_or(&lookup, "RISK_HIGH_THRESHOLD", defaults.high_threshold)?,
            late_weight: parse_or(&lookup, "RISK_LATE_WEIGHT", defaults.late_weight)?,
            delay_weight: parse_or(&lookup, "RISK_DELAY_WEIGHT", defaults.delay_weight)?,
            delay_cap_days: parse_or(&lookup, "RISK_DELAY_CAP_DAYS", defaults.delay_cap_days)?,
        };
        risk.validate()
            .map_err(|e| ConfigError::Invalid("RISK_*", e.to_string()))?;

        let alerts = AlertConfig {
            short_delay_days: parse_or(
                &lookup,
                "SHORT_DELAY_DAYS",
                AlertConfig::default().short_delay_days,
            )?,
        };

        let sweep_secs: u64 = parse_or(&lookup, "ALERT_SWEEP_INTERVAL_SECS", 0)?;
        let timeout_secs: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30)?;

        Ok(Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:4000".into()),
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite:data/scri.db".into()),
            request_timeout: Duration::from_secs(timeout_secs.max(1)),
            alert_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            risk,
            alerts,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        _ => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
