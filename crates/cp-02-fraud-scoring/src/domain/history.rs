//! Per-identity transaction history.

use dashmap::DashMap;
use shared_types::{IdentityId, Transaction};
use std::collections::VecDeque;

/// Bounded, sharded history of evaluated transactions per identity.
///
/// Each identity keeps at most `window` records; the oldest is evicted on
/// overflow. Writers for different identities never contend.
#[derive(Debug)]
pub struct TransactionHistoryStore {
    window: usize,
    histories: DashMap<IdentityId, VecDeque<Transaction>>,
}

impl TransactionHistoryStore {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            histories: DashMap::new(),
        }
    }

    /// Append a transaction to its identity's history. An identical record
    /// already held is not appended again; returns whether it was appended.
    pub fn record(&self, transaction: Transaction) -> bool {
        let mut history = self.histories.entry(transaction.identity_id).or_default();
        if history.iter().rev().any(|held| *held == transaction) {
            return false;
        }
        if history.len() >= self.window {
            history.pop_front();
        }
        history.push_back(transaction);
        true
    }

    /// Copy of the identity's history, oldest first.
    pub fn snapshot(&self, identity_id: &IdentityId) -> Vec<Transaction> {
        self.histories
            .get(identity_id)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len_for(&self, identity_id: &IdentityId) -> usize {
        self.histories.get(identity_id).map_or(0, |h| h.len())
    }

    /// Number of identities with recorded history.
    pub fn identities(&self) -> usize {
        self.histories.len()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Drop the history of an identity (e.g. after it is purged).
    pub fn forget(&self, identity_id: &IdentityId) {
        self.histories.remove(identity_id);
    }
}

impl Default for TransactionHistoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}
