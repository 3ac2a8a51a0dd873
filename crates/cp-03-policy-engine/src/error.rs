//! Error types for the policy engine.

use shared_types::ControlPlaneError;
use thiserror::Error;

/// Policy engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// Rule failed lexing, parsing or type checking
    #[error("Policy '{policy}' rejected: {reason}")]
    Parse { policy: String, reason: String },

    /// A policy with this name is already installed
    #[error("Duplicate policy: {0}")]
    DuplicatePolicy(String),

    /// No policy with this name
    #[error("Policy not found: {0}")]
    NotFound(String),

    /// Policy document could not be decoded
    #[error("Invalid policy document: {0}")]
    InvalidDocument(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

impl From<PolicyError> for ControlPlaneError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Parse { policy, reason } => {
                ControlPlaneError::PolicyParseError { policy, reason }
            }
            PolicyError::DuplicatePolicy(policy) => ControlPlaneError::PolicyParseError {
                policy,
                reason: "a policy with this name already exists".into(),
            },
            PolicyError::NotFound(id) => ControlPlaneError::NotFound { kind: "policy", id },
            PolicyError::InvalidDocument(reason) => ControlPlaneError::PolicyParseError {
                policy: "<document>".into(),
                reason,
            },
        }
    }
}
