//! Stream events and partition identifiers.

use serde::{Deserialize, Serialize};
use shared_types::{Region, Timestamp};
use std::fmt;

pub type PartitionId = u32;

/// Monotonic event identifier assigned at publish time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// What a publisher hands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_type: String,
    /// Routing key; events sharing a key land on the same partition.
    pub key: String,
    pub body: serde_json::Value,
}

impl EventPayload {
    pub fn new(
        event_type: impl Into<String>,
        key: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            key: key.into(),
            body,
        }
    }
}

/// An event owned by a partition, a consumer or the dead-letter store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub id: EventId,
    pub event_type: String,
    pub key: String,
    pub region: Region,
    pub partition: PartitionId,
    pub body: serde_json::Value,
    pub published_at: Timestamp,
    /// Failed processing attempts since the last (re)publish.
    pub retry_count: u32,
    /// Times this event has been replayed out of the dead-letter store.
    pub replays: u32,
}

/// Publish receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub event_id: EventId,
    pub partition: PartitionId,
    /// Queue depth of the partition after the enqueue (1-based position).
    pub position: usize,
}

/// 64-bit FNV-1a; stable across toolchains and runs.
pub fn hash_partition_key(key: impl AsRef<[u8]>) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    key.as_ref().iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}
