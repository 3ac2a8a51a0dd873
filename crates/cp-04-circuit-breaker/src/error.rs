//! Error types for the circuit breaker registry.

use shared_types::ControlPlaneError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitBreakerError {
    /// The service's breaker is rejecting calls
    #[error("Circuit open for {service_id}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        service_id: String,
        retry_after_ms: u64,
    },
}

/// Rejected breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BreakerConfigError {
    #[error("failure_threshold for {scope} must be at least 1")]
    ZeroThreshold { scope: String },

    #[error("reset_timeout_ms for {scope} must be at least 1")]
    ZeroTimeout { scope: String },
}

pub type CircuitBreakerResult<T> = Result<T, CircuitBreakerError>;

/// Error from a protected call: either the breaker refused or the call
/// itself failed.
#[derive(Debug, Error)]
pub enum CallError<E> {
    #[error("Circuit open for {service_id}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        service_id: String,
        retry_after_ms: u64,
    },

    #[error("Downstream call failed: {0}")]
    Inner(E),
}

impl From<CircuitBreakerError> for ControlPlaneError {
    fn from(err: CircuitBreakerError) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen {
                service_id,
                retry_after_ms,
            } => ControlPlaneError::CircuitOpen {
                service_id,
                retry_after_ms,
            },
        }
    }
}
