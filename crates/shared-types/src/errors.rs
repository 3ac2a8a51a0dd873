//! # Error Types
//!
//! Error kinds surfaced by the control plane to its collaborators. Each
//! subsystem crate defines its own error enum and converts into
//! [`ControlPlaneError`] at the service boundary.

use crate::time::Timestamp;
use thiserror::Error;

/// Errors visible at the control plane's external interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlPlaneError {
    /// The primary credential is malformed.
    #[error("Invalid credential: {reason}")]
    InvalidCredential { reason: String },

    /// The identity exists but its lifetime has elapsed.
    #[error("Identity {identity_id} expired at {expired_at}")]
    IdentityExpired {
        identity_id: String,
        expired_at: Timestamp,
    },

    /// Calls to the downstream service are being short-circuited.
    #[error("Circuit open for service {service_id}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        service_id: String,
        retry_after_ms: u64,
    },

    /// The target partition is at capacity.
    #[error("Partition {partition} overloaded: capacity {capacity} reached")]
    PartitionOverloaded { partition: u32, capacity: usize },

    /// A policy definition was rejected at registration time.
    #[error("Policy '{policy}' rejected: {reason}")]
    PolicyParseError { policy: String, reason: String },

    /// A dead-lettered event has used up its replay budget.
    #[error("Dead letter {event_id} exhausted after {replays} replays")]
    DeadLetterExhausted { event_id: u64, replays: u32 },

    /// The referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl ControlPlaneError {
    /// Whether this error is an expected backpressure signal rather than a
    /// failure of the control plane. Callers are expected to back off and retry.
    pub fn is_backpressure(&self) -> bool {
        matches!(
            self,
            ControlPlaneError::CircuitOpen { .. } | ControlPlaneError::PartitionOverloaded { .. }
        )
    }

    /// Short machine-readable kind, used in audit details and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlPlaneError::InvalidCredential { .. } => "invalid_credential",
            ControlPlaneError::IdentityExpired { .. } => "identity_expired",
            ControlPlaneError::CircuitOpen { .. } => "circuit_open",
            ControlPlaneError::PartitionOverloaded { .. } => "partition_overloaded",
            ControlPlaneError::PolicyParseError { .. } => "policy_parse_error",
            ControlPlaneError::DeadLetterExhausted { .. } => "dead_letter_exhausted",
            ControlPlaneError::NotFound { .. } => "not_found",
        }
    }
}

/// Result alias for control plane operations.
pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;
