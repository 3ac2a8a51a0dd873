//! Consumer status and snapshots.

use serde::{Deserialize, Serialize};
use shared_types::Timestamp;
use std::fmt;

pub type ConsumerId = String;

/// Subscription wildcard matching every event type.
pub const ANY_EVENT_TYPE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerStatus {
    Active,
    /// Missed at least one heartbeat window
    Degraded,
    /// Finishing in-flight work, no new claims
    Draining,
    /// Missed too many windows; work was taken away
    Dead,
}

impl ConsumerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsumerStatus::Active => "active",
            ConsumerStatus::Degraded => "degraded",
            ConsumerStatus::Draining => "draining",
            ConsumerStatus::Dead => "dead",
        }
    }

    /// Whether redelivered work may be handed to this consumer.
    pub fn accepts_redelivery(&self) -> bool {
        matches!(self, ConsumerStatus::Active | ConsumerStatus::Degraded)
    }
}

impl fmt::Display for ConsumerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `true` if `subscriptions` covers `event_type`.
pub fn subscribes_to(subscriptions: &[String], event_type: &str) -> bool {
    subscriptions
        .iter()
        .any(|s| s == ANY_EVENT_TYPE || s == event_type)
}

/// Read-only view of a consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerState {
    pub id: ConsumerId,
    pub subscribed_event_types: Vec<String>,
    pub status: ConsumerStatus,
    /// Acknowledged events per second over the last heartbeat interval
    pub processing_rate: f64,
    pub last_heartbeat: Timestamp,
    pub in_flight: usize,
    pub pending_redeliveries: usize,
    pub acked_total: u64,
    pub nacked_total: u64,
}

/// A consumer status change observed by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub consumer: ConsumerId,
    pub from: ConsumerStatus,
    pub to: ConsumerStatus,
    pub at: Timestamp,
}
