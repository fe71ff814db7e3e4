//! Configuration module for the strangle engine.
//!
//! YAML loading with environment variable interpolation and validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strangle_engine::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! let reconciler = config.to_reconciler_config();
//! ```

mod limits;
mod observability;
mod reconciliation;
mod risk;
mod storage;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use limits::LimitsConfig;
pub use observability::{LoggingConfig, ObservabilityConfig};
pub use reconciliation::ReconciliationConfig;
pub use risk::RiskConfig;
pub use storage::StorageConfig;

use crate::application::services::ReconcilerConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Order polling configuration.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Lifecycle limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Emergency-exit thresholds.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Position storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Build the reconciler configuration.
    #[must_use]
    pub const fn to_reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            poll_interval: self.reconciliation.poll_interval(),
            order_timeout: self.reconciliation.order_timeout(),
            status_query_timeout: self.reconciliation.status_query_timeout(),
            limits: self.limits.to_lifecycle_limits(),
        }
    }
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map(|m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        }
    })
    .into_owned()
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let rec = &config.reconciliation;

    if rec.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.poll_interval_secs must be positive".to_string(),
        ));
    }

    if rec.order_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.order_timeout_secs must be positive".to_string(),
        ));
    }

    if rec.status_query_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reconciliation.status_query_timeout_secs must be positive".to_string(),
        ));
    }

    if rec.status_query_timeout_secs >= rec.order_timeout_secs {
        return Err(ConfigError::ValidationError(
            "reconciliation.status_query_timeout_secs must be less than order_timeout_secs"
                .to_string(),
        ));
    }

    if rec.poll_interval_secs >= rec.order_timeout_secs {
        return Err(ConfigError::ValidationError(
            "reconciliation.poll_interval_secs must be less than order_timeout_secs".to_string(),
        ));
    }

    if !config.risk.escalate_loss_pct.is_finite() || config.risk.escalate_loss_pct <= 0.0 {
        return Err(ConfigError::ValidationError(
            "risk.escalate_loss_pct must be positive".to_string(),
        ));
    }

    if config.risk.option_c_max_dte < 0 {
        return Err(ConfigError::ValidationError(
            "risk.option_c_max_dte must not be negative".to_string(),
        ));
    }

    if config.storage.path.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "storage.path must not be empty".to_string(),
        ));
    }

    let valid_formats = ["json", "pretty"];
    if !valid_formats.contains(&config.observability.logging.format.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "observability.logging.format must be one of: {valid_formats:?}"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = match load_config_from_string("{}") {
            Ok(c) => c,
            Err(e) => panic!("should load empty config: {e}"),
        };
        assert_eq!(config.reconciliation.poll_interval_secs, 5);
        assert_eq!(config.reconciliation.order_timeout_secs, 300);
        assert_eq!(config.limits.max_adjustments, 3);
        assert_eq!(config.storage.path, "data/positions.json");
        assert_eq!(config.observability.logging.format, "json");
    }

    #[test]
    fn test_full_config_parse() {
        let yaml = r"
reconciliation:
  poll_interval_secs: 2
  order_timeout_secs: 120
  status_query_timeout_secs: 1
limits:
  max_adjustments: 2
  max_time_rolls: 1
  max_punts: 1
risk:
  escalate_loss_pct: 1.5
  option_c_max_dte: 14
storage:
  path: /var/lib/strangle/positions.json
observability:
  logging:
    level: debug
    format: pretty
";
        let config = load_config_from_string(yaml).unwrap();
        let reconciler = config.to_reconciler_config();

        assert_eq!(reconciler.poll_interval, Duration::from_secs(2));
        assert_eq!(reconciler.order_timeout, Duration::from_secs(120));
        assert_eq!(reconciler.status_query_timeout, Duration::from_secs(1));
        assert_eq!(reconciler.limits.max_adjustments, 2);
        assert_eq!(config.risk.option_c_max_dte, 14);
        assert_eq!(config.observability.logging.level, "debug");
    }

    #[test]
    fn test_env_var_with_default_when_missing() {
        let input = "path: ${STRANGLE_CONFIG_TEST_NONEXISTENT_VAR:-data/p.json}";
        assert_eq!(interpolate_env_vars(input), "path: data/p.json");
    }

    #[test]
    #[expect(clippy::literal_string_with_formatting_args)] // ${...} is env var syntax, not format args
    fn test_env_var_with_default_uses_existing() {
        let input = "path: ${PATH:-default}";
        let result = interpolate_env_vars(input);
        assert_ne!(result, "path: default");
        assert!(result.starts_with("path: "));
    }

    #[test]
    fn test_env_var_without_default_becomes_empty() {
        let input = "level: ${STRANGLE_CONFIG_TEST_UNLIKELY_TO_EXIST}";
        assert_eq!(interpolate_env_vars(input), "level: ");
    }

    #[test]
    fn test_validation_query_timeout_exceeds_order_timeout() {
        let yaml = r"
reconciliation:
  order_timeout_secs: 10
  status_query_timeout_secs: 10
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for query timeout >= order timeout");
        };
        assert!(err.to_string().contains("status_query_timeout_secs"));
    }

    #[test]
    fn test_validation_zero_poll_interval() {
        let yaml = r"
reconciliation:
  poll_interval_secs: 0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for zero poll interval");
        };
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_validation_negative_escalate_threshold() {
        let yaml = r"
risk:
  escalate_loss_pct: -1.0
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for negative threshold");
        };
        assert!(err.to_string().contains("escalate_loss_pct"));
    }

    #[test]
    fn test_validation_invalid_log_format() {
        let yaml = r"
observability:
  logging:
    format: xml
";
        let Err(err) = load_config_from_string(yaml) else {
            panic!("expected error for invalid format");
        };
        assert!(err.to_string().contains("format"));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = load_config(Some("/nonexistent/strangle/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "risk:\n  option_c_max_dte: 7\n").unwrap();

        let config = load_config(path.to_str()).unwrap();

        assert_eq!(config.risk.option_c_max_dte, 7);
    }
}
