//! Error types for the identity subsystem.

use shared_types::{ControlPlaneError, CredentialError, IdentityId, Timestamp};
use thiserror::Error;

/// Identity subsystem errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// Credential failed normalisation or validation
    #[error("Invalid credential: {0}")]
    InvalidCredential(#[from] CredentialError),

    /// Region key was empty
    #[error("Invalid credential: region must not be empty")]
    EmptyRegion,

    /// No identity with this id
    #[error("Identity not found: {0}")]
    NotFound(String),

    /// Identity lifetime has elapsed
    #[error("Identity {identity_id} expired at {expired_at}")]
    Expired {
        identity_id: IdentityId,
        expired_at: Timestamp,
    },
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;

impl From<IdentityError> for ControlPlaneError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidCredential(inner) => ControlPlaneError::InvalidCredential {
                reason: inner.to_string(),
            },
            IdentityError::EmptyRegion => ControlPlaneError::InvalidCredential {
                reason: "region must not be empty".into(),
            },
            IdentityError::NotFound(id) => ControlPlaneError::NotFound {
                kind: "identity",
                id,
            },
            IdentityError::Expired {
                identity_id,
                expired_at,
            } => ControlPlaneError::IdentityExpired {
                identity_id: identity_id.to_string(),
                expired_at,
            },
        }
    }
}
