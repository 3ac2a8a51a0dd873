//! Copy-on-write policy store.
//!
//! Readers load the current [`PolicySet`] through `ArcSwap` without taking a
//! lock. Writers serialise on a mutex, build and fully compile the next set
//! off to the side, then publish it with a single atomic swap. A failed
//! mutation leaves the installed set untouched.

use crate::domain::policy::{Policy, PolicyDefinition, PolicyDocument, PolicySummary};
use crate::error::{PolicyError, PolicyResult};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// An immutable, ordered snapshot of the installed policies.
#[derive(Debug, Default)]
pub struct PolicySet {
    version: u64,
    policies: Vec<Policy>,
}

impl PolicySet {
    fn new(version: u64, mut policies: Vec<Policy>) -> Self {
        // Priority descending, then name ascending for a total order.
        policies.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        Self { version, policies }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Policies in evaluation order.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.policies.iter().filter(|p| p.active).count()
    }
}

/// Lock-free-read policy store.
#[derive(Debug, Default)]
pub struct PolicyStore {
    current: ArcSwap<PolicySet>,
    write_lock: Mutex<()>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with `definitions`.
    pub fn with_policies(definitions: Vec<PolicyDefinition>) -> PolicyResult<Self> {
        let store = Self::new();
        store.replace_all(definitions)?;
        Ok(store)
    }

    /// Current snapshot. Holding it pins that version for the caller.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.current.load_full()
    }

    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    pub fn list(&self) -> Vec<PolicySummary> {
        self.current.load().policies.iter().map(Policy::summary).collect()
    }

    /// Install a new policy. Returns the new set version.
    pub fn add(&self, definition: PolicyDefinition) -> PolicyResult<u64> {
        let policy = Policy::compile(definition)?;
        self.mutate(|policies| {
            if policies.iter().any(|p| p.name == policy.name) {
                return Err(PolicyError::DuplicatePolicy(policy.name.clone()));
            }
            policies.push(policy);
            Ok(())
        })
    }

    /// Remove a policy by name. Returns the new set version.
    pub fn remove(&self, name: &str) -> PolicyResult<u64> {
        self.mutate(|policies| {
            let index = policies
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| PolicyError::NotFound(name.to_string()))?;
            policies.remove(index);
            Ok(())
        })
    }

    /// Activate or deactivate a policy. Returns the new set version.
    pub fn toggle(&self, name: &str, active: bool) -> PolicyResult<u64> {
        self.mutate(|policies| {
            let policy = policies
                .iter_mut()
                .find(|p| p.name == name)
                .ok_or_else(|| PolicyError::NotFound(name.to_string()))?;
            policy.active = active;
            Ok(())
        })
    }

    /// Replace the whole set. Every definition must compile and names must be
    /// unique, otherwise nothing changes.
    pub fn replace_all(&self, definitions: Vec<PolicyDefinition>) -> PolicyResult<u64> {
        let mut seen = HashSet::new();
        let mut compiled = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let policy = Policy::compile(definition)?;
            if !seen.insert(policy.name.clone()) {
                return Err(PolicyError::DuplicatePolicy(policy.name));
            }
            compiled.push(policy);
        }
        self.mutate(move |policies| {
            *policies = compiled;
            Ok(())
        })
    }

    /// Replace the whole set from a TOML document of `[[policies]]` tables.
    pub fn load_toml(&self, document: &str) -> PolicyResult<u64> {
        let document: PolicyDocument =
            toml::from_str(document).map_err(|e| PolicyError::InvalidDocument(e.to_string()))?;
        self.replace_all(document.policies)
    }

    fn mutate<F>(&self, f: F) -> PolicyResult<u64>
    where
        F: FnOnce(&mut Vec<Policy>) -> PolicyResult<()>,
    {
        let _guard = self.write_lock.lock();
        let current = self.current.load();
        let mut next = current.policies.clone();
        f(&mut next)?;

        let version = current.version + 1;
        let set = PolicySet::new(version, next);
        let count = set.len();
        self.current.store(Arc::new(set));
        info!(version, policies = count, "Policy set swapped");
        Ok(version)
    }
}
