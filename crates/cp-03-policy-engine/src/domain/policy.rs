//! Policy definitions, compiled policies and decisions.

use super::parser::parse_rule;
use super::predicate::{Facts, Predicate};
use crate::error::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use shared_types::{Region, Tier};
use std::fmt;

/// Authorization outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    Allow,
    Deny,
    Review,
}

impl PolicyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyOutcome::Allow => "allow",
            PolicyOutcome::Deny => "deny",
            PolicyOutcome::Review => "review",
        }
    }
}

impl fmt::Display for PolicyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_active() -> bool {
    true
}

/// Uncompiled policy as supplied by an operator or a TOML `[[policies]]`
/// table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    pub outcome: PolicyOutcome,
    pub rule: String,
    #[serde(default)]
    pub region_scope: Option<String>,
    #[serde(default)]
    pub tier_required: Option<Tier>,
}

impl PolicyDefinition {
    pub fn new(
        name: impl Into<String>,
        priority: i32,
        outcome: PolicyOutcome,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            active: true,
            outcome,
            rule: rule.into(),
            region_scope: None,
            tier_required: None,
        }
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region_scope = Some(region.into());
        self
    }

    pub fn requiring_tier(mut self, tier: Tier) -> Self {
        self.tier_required = Some(tier);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// TOML document shape: a list of `[[policies]]` tables.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub policies: Vec<PolicyDefinition>,
}

/// The built-in policy set installed when configuration supplies none.
pub fn baseline_policies() -> Vec<PolicyDefinition> {
    vec![
        PolicyDefinition::new("block-critical-fraud", 100, PolicyOutcome::Deny, "classification == critical"),
        PolicyDefinition::new(
            "review-large-unverified",
            60,
            PolicyOutcome::Review,
            "amount > 1000000 && !verified",
        ),
        PolicyDefinition::new("review-high-risk", 50, PolicyOutcome::Review, "classification >= high"),
    ]
}

/// A policy whose rule has been compiled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    pub name: String,
    pub priority: i32,
    pub active: bool,
    pub outcome: PolicyOutcome,
    pub rule: String,
    pub predicate: Predicate,
    pub region_scope: Option<Region>,
    pub tier_required: Option<Tier>,
}

impl Policy {
    /// Compile a definition. Rejects empty names, empty region scopes and any
    /// rule that fails to parse or type-check.
    pub fn compile(definition: PolicyDefinition) -> PolicyResult<Self> {
        let name = definition.name.trim().to_string();
        if name.is_empty() {
            return Err(PolicyError::Parse {
                policy: definition.name,
                reason: "policy name must not be empty".into(),
            });
        }

        let predicate = parse_rule(&definition.rule).map_err(|reason| PolicyError::Parse {
            policy: name.clone(),
            reason,
        })?;

        let region_scope = match definition.region_scope {
            Some(raw) => {
                let region = Region::new(&raw);
                if region.is_empty() {
                    return Err(PolicyError::Parse {
                        policy: name,
                        reason: "region_scope must not be empty".into(),
                    });
                }
                Some(region)
            }
            None => None,
        };

        Ok(Self {
            name,
            priority: definition.priority,
            active: definition.active,
            outcome: definition.outcome,
            rule: definition.rule,
            predicate,
            region_scope,
            tier_required: definition.tier_required,
        })
    }

    /// Region and tier filters. An identity satisfies `tier_required` when
    /// its tier is at least the required one.
    pub fn scope_matches(&self, facts: &Facts) -> bool {
        let region_ok = self
            .region_scope
            .as_ref()
            .map_or(true, |scope| *scope == facts.region);
        let tier_ok = self.tier_required.map_or(true, |required| facts.tier >= required);
        region_ok && tier_ok
    }

    /// Active, in scope, and predicate holds.
    pub fn fires(&self, facts: &Facts) -> bool {
        self.active && self.scope_matches(facts) && self.predicate.eval(facts)
    }

    pub fn summary(&self) -> PolicySummary {
        PolicySummary {
            name: self.name.clone(),
            priority: self.priority,
            active: self.active,
            outcome: self.outcome,
            rule: self.rule.clone(),
            region_scope: self.region_scope.clone(),
            tier_required: self.tier_required,
        }
    }
}

/// Read-only view of an installed policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub name: String,
    pub priority: i32,
    pub active: bool,
    pub outcome: PolicyOutcome,
    pub rule: String,
    pub region_scope: Option<Region>,
    pub tier_required: Option<Tier>,
}

/// Result of evaluating the policy set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: PolicyOutcome,
    pub matched_policy: Option<String>,
    pub reason: String,
}

impl Decision {
    pub const NO_MATCH_REASON: &'static str = "no policy matched";

    pub fn default_allow() -> Self {
        Self {
            outcome: PolicyOutcome::Allow,
            matched_policy: None,
            reason: Self::NO_MATCH_REASON.into(),
        }
    }

    pub fn from_policy(policy: &Policy) -> Self {
        Self {
            outcome: policy.outcome,
            matched_policy: Some(policy.name.clone()),
            reason: format!("policy '{}' matched: {}", policy.name, policy.rule),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::RiskClassification;

    fn facts(region: &str, tier: Tier) -> Facts {
        Facts {
            amount: 10_000,
            score: 20,
            classification: RiskClassification::Low,
            tier,
            region: Region::new(region),
            verified: false,
        }
    }

    #[test]
    fn test_compile_rejects_bad_rule() {
        let err = Policy::compile(PolicyDefinition::new("broken", 1, PolicyOutcome::Deny, "amount >"))
            .unwrap_err();
        assert!(matches!(err, PolicyError::Parse { ref policy, .. } if policy == "broken"));
    }

    #[test]
    fn test_compile_rejects_blank_name_and_scope() {
        assert!(Policy::compile(PolicyDefinition::new("  ", 1, PolicyOutcome::Deny, "true")).is_err());
        assert!(Policy::compile(
            PolicyDefinition::new("p", 1, PolicyOutcome::Deny, "true").in_region(" ")
        )
        .is_err());
    }

    #[test]
    fn test_scope_filters() {
        let policy = Policy::compile(
            PolicyDefinition::new("kisumu-premium", 1, PolicyOutcome::Review, "true")
                .in_region("Kisumu")
                .requiring_tier(Tier::Verified),
        )
        .unwrap();

        assert!(!policy.fires(&facts("nairobi", Tier::Premium)));
        assert!(!policy.fires(&facts("kisumu", Tier::Basic)));
        assert!(policy.fires(&facts("kisumu", Tier::Verified)));
        assert!(policy.fires(&facts("kisumu", Tier::Premium)));
    }

    #[test]
    fn test_inactive_never_fires() {
        let policy =
            Policy::compile(PolicyDefinition::new("off", 1, PolicyOutcome::Deny, "true").inactive())
                .unwrap();
        assert!(!policy.fires(&facts("nairobi", Tier::Basic)));
    }

    #[test]
    fn test_baseline_policies_compile() {
        for definition in baseline_policies() {
            assert!(Policy::compile(definition).is_ok());
        }
    }

    #[test]
    fn test_document_from_toml() {
        let doc: PolicyDocument = toml::from_str(
            r#"
            [[policies]]
            name = "deny-huge"
            priority = 10
            outcome = "deny"
            rule = "amount > 5000000"
            tier_required = "verified"
            "#,
        )
        .unwrap();
        assert_eq!(doc.policies.len(), 1);
        assert!(doc.policies[0].active);
        assert_eq!(doc.policies[0].tier_required, Some(Tier::Verified));
    }
}
