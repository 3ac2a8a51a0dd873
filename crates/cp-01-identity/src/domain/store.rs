//! Identity store.
//!
//! Two sharded indexes: every identity by id (including expired ones until
//! purged) and the current identity id per credential.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{Credential, Identity, IdentityId, Timestamp};

/// Sharded identity storage with no global lock.
#[derive(Debug, Default)]
pub struct IdentityStore {
    by_id: DashMap<IdentityId, Identity>,
    current: DashMap<Credential, IdentityId>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live identity for `credential`, or install the one built by
    /// `make` if there is none (or the current one has expired).
    ///
    /// The credential's shard entry is held for the whole check-and-insert, so
    /// concurrent callers for one credential observe a single winner.
    /// Returns the identity and whether it was freshly created.
    pub fn get_or_issue(
        &self,
        credential: &Credential,
        now: Timestamp,
        make: impl FnOnce() -> Identity,
    ) -> (Identity, bool) {
        match self.current.entry(credential.clone()) {
            Entry::Occupied(mut slot) => {
                if let Some(existing) = self.by_id.get(slot.get()) {
                    if !existing.is_expired(now) {
                        return (existing.clone(), false);
                    }
                }
                let fresh = make();
                self.by_id.insert(fresh.id, fresh.clone());
                slot.insert(fresh.id);
                (fresh, true)
            }
            Entry::Vacant(slot) => {
                let fresh = make();
                self.by_id.insert(fresh.id, fresh.clone());
                slot.insert(fresh.id);
                (fresh, true)
            }
        }
    }

    /// Identity by id, expired or not.
    pub fn get(&self, id: &IdentityId) -> Option<Identity> {
        self.by_id.get(id).map(|e| e.clone())
    }

    /// Current non-expired identity for a credential.
    pub fn current(&self, credential: &Credential, now: Timestamp) -> Option<Identity> {
        let id = *self.current.get(credential)?;
        self.by_id
            .get(&id)
            .filter(|identity| !identity.is_expired(now))
            .map(|identity| identity.clone())
    }

    /// Apply `f` to the stored identity and return the updated copy.
    pub fn update<F>(&self, id: &IdentityId, f: F) -> Option<Identity>
    where
        F: FnOnce(&mut Identity),
    {
        let mut entry = self.by_id.get_mut(id)?;
        f(entry.value_mut());
        Some(entry.clone())
    }

    /// Number of non-expired current identities.
    pub fn active_count(&self, now: Timestamp) -> usize {
        self.current
            .iter()
            .filter(|entry| {
                self.by_id
                    .get(entry.value())
                    .is_some_and(|identity| !identity.is_expired(now))
            })
            .count()
    }

    /// Number of non-expired current identities with `verified` set.
    pub fn verified_count(&self, now: Timestamp) -> usize {
        self.current
            .iter()
            .filter(|entry| {
                self.by_id
                    .get(entry.value())
                    .is_some_and(|identity| identity.verified && !identity.is_expired(now))
            })
            .count()
    }

    /// Total identities held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Drop expired identities from both indexes. Returns how many were removed.
    pub fn purge_expired(&self, now: Timestamp) -> usize {
        self.current.retain(|_, id| {
            self.by_id
                .get(id)
                .is_some_and(|identity| !identity.is_expired(now))
        });
        let before = self.by_id.len();
        self.by_id.retain(|_, identity| !identity.is_expired(now));
        before - self.by_id.len()
    }
}
