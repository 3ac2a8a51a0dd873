//! Breaker thresholds with per-service overrides.

use crate::error::BreakerConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-service override; unset fields fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOverride {
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time an open circuit waits before admitting a probe
    pub reset_timeout_ms: u64,
    /// Overrides keyed by service id
    pub services: HashMap<String, ServiceOverride>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            services: HashMap::new(),
        }
    }
}

impl CircuitBreakerConfig {
    /// Effective `(threshold, reset_timeout_ms)` for a service.
    pub fn for_service(&self, service_id: &str) -> (u32, u64) {
        let service = self.services.get(service_id);
        (
            service
                .and_then(|s| s.failure_threshold)
                .unwrap_or(self.failure_threshold),
            service
                .and_then(|s| s.reset_timeout_ms)
                .unwrap_or(self.reset_timeout_ms),
        )
    }

    pub fn validate(&self) -> Result<(), BreakerConfigError> {
        let scopes = std::iter::once(("default".to_string(), (self.failure_threshold, self.reset_timeout_ms)))
            .chain(self.services.keys().map(|id| (id.clone(), self.for_service(id))));
        for (scope, (threshold, timeout)) in scopes {
            if threshold == 0 {
                return Err(BreakerConfigError::ZeroThreshold { scope });
            }
            if timeout == 0 {
                return Err(BreakerConfigError::ZeroTimeout { scope });
            }
        }
        Ok(())
    }
}
