//! Identity Issuer - Core business logic

use crate::domain::IdentityStore;
use crate::error::{IdentityError, IdentityResult};
use crate::ports::inbound::{IdentityApi, IssueOutcome};
use serde::{Deserialize, Serialize};
use shared_types::{
    Credential, Identity, IdentityId, Region, Tier, TimeSource, Timestamp, MILLIS_PER_SECOND,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Identity configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Lifetime of an issued identity (seconds)
    pub lifetime_secs: u64,
    /// Tier assigned at issuance
    pub default_tier: Tier,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            lifetime_secs: 24 * 60 * 60,
            default_tier: Tier::Basic,
        }
    }
}

impl IdentityConfig {
    fn lifetime_ms(&self) -> u64 {
        // A zero lifetime would violate expires_at > issued_at.
        self.lifetime_secs.max(1) * MILLIS_PER_SECOND
    }
}

/// Identity issuer implementation
pub struct IdentityIssuer {
    config: IdentityConfig,
    store: Arc<IdentityStore>,
    clock: Arc<dyn TimeSource>,
}

impl IdentityIssuer {
    pub fn new(config: IdentityConfig, store: Arc<IdentityStore>, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            config,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<IdentityStore> {
        &self.store
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Verified identities alive at `now`.
    pub fn verified_count(&self, now: Timestamp) -> usize {
        self.store.verified_count(now)
    }

    /// Remove expired identities from the store.
    pub fn purge_expired(&self) -> usize {
        let removed = self.store.purge_expired(self.clock.now());
        if removed > 0 {
            info!(removed, "Purged expired identities");
        }
        removed
    }
}

impl IdentityApi for IdentityIssuer {
    fn issue(&self, credential: &str, region: &str) -> IdentityResult<IssueOutcome> {
        let credential = Credential::parse(credential)?;
        let region = Region::new(region);
        if region.is_empty() {
            return Err(IdentityError::EmptyRegion);
        }

        let now = self.clock.now();
        let (identity, issued) = self.store.get_or_issue(&credential, now, || Identity {
            id: IdentityId::new_v4(),
            primary_credential: credential.clone(),
            region: region.clone(),
            tier: self.config.default_tier,
            issued_at: now,
            expires_at: now + self.config.lifetime_ms(),
            verified: false,
        });

        if issued {
            info!(
                identity_id = %identity.id,
                credential = %credential.masked(),
                region = %identity.region,
                tier = %identity.tier,
                "Identity issued"
            );
        } else {
            debug!(identity_id = %identity.id, "Returning live identity for credential");
        }

        Ok(IssueOutcome { identity, issued })
    }

    fn verify(&self, identity_id: &IdentityId) -> IdentityResult<Identity> {
        let current = self.resolve(identity_id)?;
        if current.verified {
            return Ok(current);
        }

        let updated = self
            .store
            .update(identity_id, |identity| identity.verified = true)
            .ok_or_else(|| IdentityError::NotFound(identity_id.to_string()))?;
        info!(identity_id = %identity_id, "Identity verified");
        Ok(updated)
    }

    fn lookup(&self, credential: &str) -> IdentityResult<Identity> {
        let credential = Credential::parse(credential)?;
        self.store
            .current(&credential, self.clock.now())
            .ok_or_else(|| IdentityError::NotFound(credential.masked()))
    }

    fn get(&self, identity_id: &IdentityId) -> Option<Identity> {
        self.store.get(identity_id)
    }

    fn resolve(&self, identity_id: &IdentityId) -> IdentityResult<Identity> {
        let identity = self
            .store
            .get(identity_id)
            .ok_or_else(|| IdentityError::NotFound(identity_id.to_string()))?;
        if identity.is_expired(self.clock.now()) {
            return Err(IdentityError::Expired {
                identity_id: identity.id,
                expired_at: identity.expires_at,
            });
        }
        Ok(identity)
    }

    fn active_count(&self, now: Timestamp) -> usize {
        self.store.active_count(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shared_types::{CredentialError, ManualTimeSource, MILLIS_PER_HOUR};

    fn issuer() -> (IdentityIssuer, Arc<ManualTimeSource>) {
        let clock = Arc::new(ManualTimeSource::new(1_700_000_000_000));
        let issuer = IdentityIssuer::new(
            IdentityConfig::default(),
            Arc::new(IdentityStore::new()),
            clock.clone(),
        );
        (issuer, clock)
    }

    #[test]
    fn test_issue_fresh_basic_identity() {
        let (issuer, clock) = issuer();
        let outcome = issuer.issue("254712345678", "nairobi").unwrap();

        assert!(outcome.issued);
        let identity = outcome.identity;
        assert_eq!(identity.tier, Tier::Basic);
        assert!(!identity.verified);
        assert_eq!(identity.issued_at, clock.now());
        assert_eq!(identity.expires_at, clock.now() + 24 * MILLIS_PER_HOUR);
    }

    #[test]
    fn test_issue_is_idempotent_by_credential() {
        let (issuer, clock) = issuer();
        let first = issuer.issue("254712345678", "nairobi").unwrap();
        clock.advance(MILLIS_PER_HOUR);
        let second = issuer.issue("+254 712 345 678", "mombasa").unwrap();

        assert!(!second.issued);
        assert_eq!(first.identity, second.identity);
    }

    #[test]
    fn test_issue_after_expiry_creates_new_identity() {
        let (issuer, clock) = issuer();
        let first = issuer.issue("254712345678", "nairobi").unwrap();
        clock.advance(24 * MILLIS_PER_HOUR);
        let second = issuer.issue("254712345678", "nairobi").unwrap();

        assert!(second.issued);
        assert_ne!(first.identity.id, second.identity.id);
    }

    #[test]
    fn test_issue_rejects_malformed_input() {
        let (issuer, _) = issuer();
        assert_eq!(
            issuer.issue("not-a-phone", "nairobi"),
            Err(IdentityError::InvalidCredential(CredentialError::NonDigit('n')))
        );
        assert_eq!(
            issuer.issue("254712345678", "   "),
            Err(IdentityError::EmptyRegion)
        );
    }

    #[test]
    fn test_verify_is_idempotent() {
        let (issuer, _) = issuer();
        let identity = issuer.issue("254712345678", "nairobi").unwrap().identity;

        let once = issuer.verify(&identity.id).unwrap();
        let twice = issuer.verify(&identity.id).unwrap();
        assert!(once.verified);
        assert_eq!(once, twice);
        assert_eq!(issuer.verified_count(identity.issued_at), 1);
    }

    #[test]
    fn test_verify_unknown_and_expired() {
        let (issuer, clock) = issuer();
        assert!(matches!(
            issuer.verify(&IdentityId::new_v4()),
            Err(IdentityError::NotFound(_))
        ));

        let identity = issuer.issue("254712345678", "nairobi").unwrap().identity;
        clock.set(identity.expires_at);
        assert!(matches!(
            issuer.verify(&identity.id),
            Err(IdentityError::Expired { .. })
        ));
    }

    #[test]
    fn test_lookup_only_returns_active() {
        let (issuer, clock) = issuer();
        let identity = issuer.issue("254712345678", "nairobi").unwrap().identity;

        assert_eq!(issuer.lookup("254712345678").unwrap(), identity);
        clock.set(identity.expires_at);
        assert!(matches!(
            issuer.lookup("254712345678"),
            Err(IdentityError::NotFound(_))
        ));
        assert_eq!(issuer.active_count(clock.now()), 0);
        assert_eq!(issuer.purge_expired(), 1);
    }

    #[test]
    fn test_concurrent_issue_single_winner() {
        let (issuer, _) = issuer();
        let issuer = Arc::new(issuer);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let issuer = Arc::clone(&issuer);
                std::thread::spawn(move || issuer.issue("254712345678", "nairobi").unwrap())
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(outcomes.iter().filter(|o| o.issued).count(), 1);
        assert!(outcomes
            .windows(2)
            .all(|w| w[0].identity.id == w[1].identity.id));
    }

    proptest! {
        #[test]
        fn prop_expiry_after_issuance(digits in "[0-9]{10,15}", lifetime in 1u64..1_000_000) {
            let clock = Arc::new(ManualTimeSource::new(1_000));
            let issuer = IdentityIssuer::new(
                IdentityConfig { lifetime_secs: lifetime, default_tier: Tier::Basic },
                Arc::new(IdentityStore::new()),
                clock,
            );
            let identity = issuer.issue(&digits, "nairobi").unwrap().identity;
            prop_assert!(identity.expires_at > identity.issued_at);
        }
    }
}
