//! # Control Plane Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! Sources, later wins:
//!
//! 1. Built-in defaults (every section is `#[serde(default)]`)
//! 2. A TOML file (`--config <path>`)
//! 3. `CP_*` environment variables
//!
//! `validate()` runs every subsystem's own checks so a bad value is reported
//! before anything is constructed.

use std::path::{Path, PathBuf};

use cp_01_identity::IdentityConfig;
use cp_02_fraud_scoring::{FraudConfig, FraudError};
use cp_03_policy_engine::{Policy, PolicyDefinition, PolicyError};
use cp_04_circuit_breaker::{BreakerConfigError, CircuitBreakerConfig};
use cp_05_event_streaming::{StreamingConfig, StreamingConfigError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete control plane configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Identity issuance.
    pub identity: IdentityConfig,
    /// Fraud scoring weights and history window.
    pub fraud: FraudConfig,
    /// Circuit breaker defaults and per-service overrides.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Partition layout and consumer supervision.
    pub streaming: StreamingConfig,
    /// Alert thresholds.
    pub alerts: AlertConfig,
    /// Runtime loop intervals.
    pub runtime: RuntimeConfig,
    /// Initial policy set; the built-in baseline is installed when empty.
    pub policies: Vec<PolicyDefinition>,
}

/// Alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Dead-letter count at which a high-severity alert is raised.
    pub dead_letter_watermark: usize,
    /// Per-subscriber buffer before the oldest alerts are dropped.
    pub channel_capacity: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            dead_letter_watermark: 100,
            channel_capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Runtime loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How often the metrics snapshot is logged.
    pub snapshot_interval_secs: u64,
    /// How often the consumer supervision sweep runs.
    pub supervise_interval_ms: u64,
    /// When set, the Prometheus text exposition is rewritten here on every
    /// snapshot tick and once more at shutdown.
    pub metrics_file: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: 30,
            supervise_interval_ms: 1_000,
            metrics_file: None,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Invalid fraud config: {0}")]
    Fraud(#[from] FraudError),

    #[error("Invalid circuit breaker config: {0}")]
    CircuitBreaker(#[from] BreakerConfigError),

    #[error("Invalid streaming config: {0}")]
    Streaming(#[from] StreamingConfigError),

    #[error("Invalid policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}

impl ControlPlaneConfig {
    /// Parse a TOML document. Missing sections take their defaults.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(document)?)
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&document)
    }

    /// Defaults or `path`, then `CP_*` environment overrides, then
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CP_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `CP_IDENTITY_LIFETIME_SECS` | `identity.lifetime_secs` |
    /// | `CP_PARTITION_CAPACITY` | `streaming.partition_capacity` |
    /// | `CP_CB_THRESHOLD` | `circuit_breaker.failure_threshold` |
    /// | `CP_CB_RESET_TIMEOUT_MS` | `circuit_breaker.reset_timeout_ms` |
    /// | `CP_SNAPSHOT_INTERVAL_SECS` | `runtime.snapshot_interval_secs` |
    /// | `CP_DEAD_LETTER_WATERMARK` | `alerts.dead_letter_watermark` |
    /// | `CP_METRICS_FILE` | `runtime.metrics_file` |
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = parse_env(&lookup, "CP_IDENTITY_LIFETIME_SECS")? {
            self.identity.lifetime_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "CP_PARTITION_CAPACITY")? {
            self.streaming.partition_capacity = v;
        }
        if let Some(v) = parse_env(&lookup, "CP_CB_THRESHOLD")? {
            self.circuit_breaker.failure_threshold = v;
        }
        if let Some(v) = parse_env(&lookup, "CP_CB_RESET_TIMEOUT_MS")? {
            self.circuit_breaker.reset_timeout_ms = v;
        }
        if let Some(v) = parse_env(&lookup, "CP_SNAPSHOT_INTERVAL_SECS")? {
            self.runtime.snapshot_interval_secs = v;
        }
        if let Some(v) = parse_env(&lookup, "CP_DEAD_LETTER_WATERMARK")? {
            self.alerts.dead_letter_watermark = v;
        }
        if let Some(path) = lookup("CP_METRICS_FILE").filter(|p| !p.trim().is_empty()) {
            self.runtime.metrics_file = Some(PathBuf::from(path.trim()));
        }
        Ok(())
    }

    /// Check every section. Policies are compiled to surface rule errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fraud.validate()?;
        self.circuit_breaker.validate()?;
        self.streaming.validate()?;

        let checks = [
            ("identity.lifetime_secs", self.identity.lifetime_secs),
            (
                "alerts.dead_letter_watermark",
                self.alerts.dead_letter_watermark as u64,
            ),
            ("alerts.channel_capacity", self.alerts.channel_capacity as u64),
            (
                "runtime.snapshot_interval_secs",
                self.runtime.snapshot_interval_secs,
            ),
            (
                "runtime.supervise_interval_ms",
                self.runtime.supervise_interval_ms,
            ),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }

        for definition in &self.policies {
            Policy::compile(definition.clone())?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ControlPlaneConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identity.lifetime_secs, 86_400);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.alerts.dead_letter_watermark, 100);
        assert!(config.policies.is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ControlPlaneConfig::from_toml_str(
            r#"
            [streaming]
            regions = ["nairobi", "kisumu"]
            partition_capacity = 8

            [circuit_breaker.services.payments-service]
            failure_threshold = 2

            [[policies]]
            name = "deny-huge"
            priority = 10
            outcome = "deny"
            rule = "amount > 5000000"
            "#,
        )
        .unwrap();

        assert_eq!(config.streaming.regions, vec!["nairobi", "kisumu"]);
        assert_eq!(config.streaming.partition_capacity, 8);
        assert_eq!(config.streaming.partitions_per_region, 2);
        assert_eq!(config.circuit_breaker.for_service("payments-service").0, 2);
        assert_eq!(config.policies.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ControlPlaneConfig::default();
        config
            .apply_env_overrides(lookup(&[
                ("CP_PARTITION_CAPACITY", "64"),
                ("CP_CB_THRESHOLD", " 3 "),
                ("CP_SNAPSHOT_INTERVAL_SECS", "5"),
                ("CP_METRICS_FILE", "/var/lib/sentinel/metrics.prom"),
            ]))
            .unwrap();

        assert_eq!(config.streaming.partition_capacity, 64);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.runtime.snapshot_interval_secs, 5);
        assert_eq!(
            config.runtime.metrics_file.as_deref(),
            Some(Path::new("/var/lib/sentinel/metrics.prom"))
        );
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ControlPlaneConfig::default();
        let err = config
            .apply_env_overrides(lookup(&[("CP_CB_RESET_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "CP_CB_RESET_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_sections() {
        let mut config = ControlPlaneConfig::default();
        config.streaming.partition_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Streaming(_))));

        let mut config = ControlPlaneConfig::default();
        config.policies.push(PolicyDefinition::new(
            "broken",
            1,
            cp_03_policy_engine::PolicyOutcome::Deny,
            "amount >",
        ));
        assert!(matches!(config.validate(), Err(ConfigError::Policy(_))));

        let mut config = ControlPlaneConfig::default();
        config.alerts.dead_letter_watermark = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "alerts.dead_letter_watermark"
            })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = ControlPlaneConfig::from_file(Path::new("/nonexistent/sentinel.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
