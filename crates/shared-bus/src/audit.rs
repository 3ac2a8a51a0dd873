//! # Audit Log
//!
//! Append-only record of every control-plane decision and transition.
//!
//! INVARIANT: `sequence_id` is strictly increasing in append order. The
//! sequence number is assigned under the same write lock that pushes the
//! entry, so concurrent appenders can never interleave out of order.

use crate::events::AuditEventKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::Timestamp;
use tracing::debug;

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sequence_id: u64,
    pub timestamp: Timestamp,
    pub event_kind: AuditEventKind,
    /// Subsystem that produced the entry (e.g. `identity`, `policy`).
    pub source: String,
    pub details: serde_json::Value,
}

/// In-memory append-only audit log.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a copy of it with its assigned sequence id.
    pub fn append(
        &self,
        timestamp: Timestamp,
        event_kind: AuditEventKind,
        source: &str,
        details: serde_json::Value,
    ) -> AuditEntry {
        let mut entries = self.entries.write();
        let sequence_id = entries.last().map_or(1, |last| last.sequence_id + 1);
        let entry = AuditEntry {
            sequence_id,
            timestamp,
            event_kind,
            source: source.to_string(),
            details,
        };
        entries.push(entry.clone());
        drop(entries);

        debug!(sequence_id, kind = %event_kind, source, "Audit entry appended");
        entry
    }

    /// Number of entries recorded.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Sequence id of the newest entry, or 0 when the log is empty.
    pub fn last_sequence(&self) -> u64 {
        self.entries.read().last().map_or(0, |e| e.sequence_id)
    }

    /// Copy of every entry.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    /// Entries with `sequence_id > after`.
    pub fn since(&self, after: u64) -> Vec<AuditEntry> {
        let entries = self.entries.read();
        // Sequence ids are dense and start at 1, so the index is `after`.
        let start = (after as usize).min(entries.len());
        entries[start..].to_vec()
    }

    /// Entries of one kind, in append order.
    pub fn by_kind(&self, kind: AuditEventKind) -> Vec<AuditEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.event_kind == kind)
            .cloned()
            .collect()
    }

    /// Count of entries of one kind.
    pub fn count_kind(&self, kind: AuditEventKind) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.event_kind == kind)
            .count()
    }
}
