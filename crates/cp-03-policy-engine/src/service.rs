//! Policy Engine - evaluation over the current policy snapshot

use crate::domain::policy::{Decision, PolicyDefinition, PolicySummary};
use crate::domain::predicate::Facts;
use crate::error::PolicyResult;
use crate::store::PolicyStore;
use shared_types::{Identity, Transaction};
use std::sync::Arc;
use tracing::debug;

/// Evaluates transactions against the installed policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine {
    store: Arc<PolicyStore>,
}

impl PolicyEngine {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    pub fn with_policies(definitions: Vec<PolicyDefinition>) -> PolicyResult<Self> {
        Ok(Self::new(Arc::new(PolicyStore::with_policies(definitions)?)))
    }

    pub fn store(&self) -> &Arc<PolicyStore> {
        &self.store
    }

    /// Decide `transaction` for `identity` given its fraud `score`.
    ///
    /// Loads exactly one snapshot, so a concurrent swap is either fully
    /// visible or not at all.
    pub fn evaluate(&self, identity: &Identity, transaction: &Transaction, score: u8) -> Decision {
        self.evaluate_facts(&Facts::new(identity, transaction, score))
    }

    /// Decide from pre-built facts.
    pub fn evaluate_facts(&self, facts: &Facts) -> Decision {
        let snapshot = self.store.snapshot();
        let decision = snapshot
            .policies()
            .iter()
            .find(|policy| policy.fires(facts))
            .map(Decision::from_policy)
            .unwrap_or_else(Decision::default_allow);

        debug!(
            version = snapshot.version(),
            outcome = %decision.outcome,
            matched = decision.matched_policy.as_deref().unwrap_or("-"),
            "Policy evaluated"
        );
        decision
    }

    pub fn add(&self, definition: PolicyDefinition) -> PolicyResult<u64> {
        self.store.add(definition)
    }

    pub fn remove(&self, name: &str) -> PolicyResult<u64> {
        self.store.remove(name)
    }

    pub fn toggle(&self, name: &str, active: bool) -> PolicyResult<u64> {
        self.store.toggle(name, active)
    }

    pub fn replace_all(&self, definitions: Vec<PolicyDefinition>) -> PolicyResult<u64> {
        self.store.replace_all(definitions)
    }

    pub fn load_toml(&self, document: &str) -> PolicyResult<u64> {
        self.store.load_toml(document)
    }

    pub fn list(&self) -> Vec<PolicySummary> {
        self.store.list()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::{baseline_policies, PolicyOutcome};
    use shared_types::{Credential, IdentityId, Region, Tier, MILLIS_PER_DAY};
    use std::thread;

    const T0: u64 = 1_700_000_000_000;

    fn identity(tier: Tier, verified: bool) -> Identity {
        Identity {
            id: IdentityId::new_v4(),
            primary_credential: Credential::parse("254712345678").unwrap(),
            region: Region::new("nairobi"),
            tier,
            issued_at: T0,
            expires_at: T0 + MILLIS_PER_DAY,
            verified,
        }
    }

    fn tx(identity: &Identity, amount: u64, region: &str) -> Transaction {
        Transaction::in_region(identity.id, amount, Region::new(region), T0 + 1)
    }

    #[test]
    fn test_no_policies_allows() {
        let engine = PolicyEngine::default();
        let id = identity(Tier::Basic, false);
        let decision = engine.evaluate(&id, &tx(&id, 5_000, "nairobi"), 48);
        assert_eq!(decision, Decision::default_allow());
        assert_eq!(decision.reason, "no policy matched");
    }

    #[test]
    fn test_baseline_outcomes() {
        let engine = PolicyEngine::with_policies(baseline_policies()).unwrap();
        let id = identity(Tier::Basic, false);

        assert_eq!(engine.evaluate(&id, &tx(&id, 5_000, "nairobi"), 48).outcome, PolicyOutcome::Allow);

        let critical = engine.evaluate(&id, &tx(&id, 5_000, "nairobi"), 95);
        assert_eq!(critical.outcome, PolicyOutcome::Deny);
        assert_eq!(critical.matched_policy.as_deref(), Some("block-critical-fraud"));

        let high = engine.evaluate(&id, &tx(&id, 5_000, "nairobi"), 75);
        assert_eq!(high.outcome, PolicyOutcome::Review);

        let large = engine.evaluate(&id, &tx(&id, 2_000_000, "nairobi"), 10);
        assert_eq!(large.matched_policy.as_deref(), Some("review-large-unverified"));

        let verified = identity(Tier::Verified, true);
        assert_eq!(
            engine.evaluate(&verified, &tx(&verified, 2_000_000, "nairobi"), 10).outcome,
            PolicyOutcome::Allow
        );
    }

    #[test]
    fn test_first_match_by_priority_wins() {
        let engine = PolicyEngine::with_policies(vec![
            PolicyDefinition::new("low-allow", 1, PolicyOutcome::Allow, "true"),
            PolicyDefinition::new("high-deny", 10, PolicyOutcome::Deny, "amount > 100"),
            PolicyDefinition::new("mid-review", 5, PolicyOutcome::Review, "amount > 100"),
        ])
        .unwrap();
        let id = identity(Tier::Basic, false);

        assert_eq!(engine.evaluate(&id, &tx(&id, 500, "nairobi"), 0).outcome, PolicyOutcome::Deny);
        engine.toggle("high-deny", false).unwrap();
        assert_eq!(engine.evaluate(&id, &tx(&id, 500, "nairobi"), 0).outcome, PolicyOutcome::Review);
        assert_eq!(engine.evaluate(&id, &tx(&id, 50, "nairobi"), 0).outcome, PolicyOutcome::Allow);
    }

    #[test]
    fn test_region_and_tier_scope() {
        let engine = PolicyEngine::with_policies(vec![PolicyDefinition::new(
            "mombasa-premium-review",
            1,
            PolicyOutcome::Review,
            "amount > 0",
        )
        .in_region("mombasa")
        .requiring_tier(Tier::Premium)])
        .unwrap();

        let basic = identity(Tier::Basic, false);
        let premium = identity(Tier::Premium, true);
        assert_eq!(engine.evaluate(&basic, &tx(&basic, 10, "mombasa"), 0).outcome, PolicyOutcome::Allow);
        assert_eq!(engine.evaluate(&premium, &tx(&premium, 10, "nairobi"), 0).outcome, PolicyOutcome::Allow);
        assert_eq!(engine.evaluate(&premium, &tx(&premium, 10, "mombasa"), 0).outcome, PolicyOutcome::Review);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let engine = PolicyEngine::with_policies(baseline_policies()).unwrap();
        let id = identity(Tier::Basic, false);
        let t = tx(&id, 1_500_000, "kisumu");
        assert_eq!(engine.evaluate(&id, &t, 72), engine.evaluate(&id, &t, 72));
    }

    #[test]
    fn test_readers_see_whole_sets_during_swaps() {
        // Two sets that each deny everything; a torn read would allow.
        let set_a = vec![
            PolicyDefinition::new("a1", 2, PolicyOutcome::Deny, "true"),
            PolicyDefinition::new("a2", 1, PolicyOutcome::Deny, "true"),
        ];
        let set_b = vec![PolicyDefinition::new("b1", 1, PolicyOutcome::Deny, "true")];
        let engine = PolicyEngine::with_policies(set_a.clone()).unwrap();

        let writer = {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let set = if i % 2 == 0 { set_b.clone() } else { set_a.clone() };
                    engine.replace_all(set).unwrap();
                }
            })
        };

        let id = identity(Tier::Basic, false);
        let t = tx(&id, 1, "nairobi");
        for _ in 0..2_000 {
            assert_eq!(engine.evaluate(&id, &t, 0).outcome, PolicyOutcome::Deny);
        }
        writer.join().unwrap();
        assert_eq!(engine.version(), 201);
    }
}
