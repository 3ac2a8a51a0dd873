//! Error types for fraud scoring configuration.
//!
//! Scoring itself is infallible; only configuration can be rejected.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FraudError {
    #[error("Invalid factor weight {name}: {value} (must be finite and >= 0)")]
    InvalidWeight { name: &'static str, value: f64 },

    #[error("Factor weights sum to zero")]
    ZeroWeights,

    #[error("Invalid max plausible speed: {0} km/h")]
    InvalidSpeed(f64),

    #[error("History window must be at least 1")]
    EmptyHistoryWindow,
}

pub type FraudResult<T> = Result<T, FraudError>;
