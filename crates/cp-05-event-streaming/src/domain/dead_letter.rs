//! Dead-letter store.
//!
//! Entries are retained until an operator drains or replays them.

use super::event::{EventId, PartitionId, StreamEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::Timestamp;
use std::collections::BTreeMap;

/// Reason recorded when a dead consumer's work cannot be redelivered.
pub const REASON_CONSUMER_DEAD: &str = "consumer-dead";

/// Reason recorded when a claimed event outlives the processing timeout.
pub const REASON_PROCESSING_TIMEOUT: &str = "processing-timeout";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub event_id: EventId,
    pub original_partition: PartitionId,
    pub event_type: String,
    pub reason: String,
    pub retry_count: u32,
    pub replay_count: u32,
    pub dead_lettered_at: Timestamp,
    pub event: StreamEvent,
}

impl DeadLetterEntry {
    pub fn new(event: StreamEvent, reason: impl Into<String>, at: Timestamp) -> Self {
        Self {
            event_id: event.id,
            original_partition: event.partition,
            event_type: event.event_type.clone(),
            reason: reason.into(),
            retry_count: event.retry_count,
            replay_count: event.replays,
            dead_lettered_at: at,
            event,
        }
    }
}

/// Dead letters ordered by event id.
#[derive(Debug, Default)]
pub struct DeadLetterStore {
    entries: Mutex<BTreeMap<EventId, DeadLetterEntry>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. Returns the store size afterwards.
    pub fn insert(&self, entry: DeadLetterEntry) -> usize {
        let mut entries = self.entries.lock();
        entries.insert(entry.event_id, entry);
        entries.len()
    }

    pub fn get(&self, event_id: EventId) -> Option<DeadLetterEntry> {
        self.entries.lock().get(&event_id).cloned()
    }

    pub fn list(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove one entry.
    pub fn take(&self, event_id: EventId) -> Option<DeadLetterEntry> {
        self.entries.lock().remove(&event_id)
    }

    /// Remove and return every entry.
    pub fn drain(&self) -> Vec<DeadLetterEntry> {
        std::mem::take(&mut *self.entries.lock())
            .into_values()
            .collect()
    }
}
