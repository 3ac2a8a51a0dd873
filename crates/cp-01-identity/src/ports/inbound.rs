//! Driving Ports (API - Inbound)

use crate::error::IdentityResult;
use shared_types::{Identity, IdentityId, Timestamp};

/// Result of an issuance request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueOutcome {
    pub identity: Identity,
    /// `true` when a new identity was created, `false` when the existing
    /// live identity for the credential was returned.
    pub issued: bool,
}

/// Primary identity API.
pub trait IdentityApi: Send + Sync {
    /// Issue (or return the live) identity for a raw credential.
    fn issue(&self, credential: &str, region: &str) -> IdentityResult<IssueOutcome>;

    /// Mark an identity verified. Idempotent.
    fn verify(&self, identity_id: &IdentityId) -> IdentityResult<Identity>;

    /// Current non-expired identity for a raw credential.
    fn lookup(&self, credential: &str) -> IdentityResult<Identity>;

    /// Identity by id, expired or not.
    fn get(&self, identity_id: &IdentityId) -> Option<Identity>;

    /// Identity by id, failing with `Expired` once its lifetime has elapsed.
    fn resolve(&self, identity_id: &IdentityId) -> IdentityResult<Identity>;

    /// Number of live identities at `now`.
    fn active_count(&self, now: Timestamp) -> usize;
}
