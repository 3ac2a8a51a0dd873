//! # Read Models
//!
//! Values handed to dashboards and operators. They are plain data: taking
//! one never mutates the control plane, and holding one never blocks it.

use std::collections::BTreeMap;

use cp_02_fraud_scoring::FraudScore;
use cp_03_policy_engine::Decision;
use cp_04_circuit_breaker::CircuitBreakerState;
use cp_05_event_streaming::{Ack, ConsumerState, PartitionSnapshot};
use serde::{Deserialize, Serialize};
use shared_types::{Identity, RiskClassification, Severity, Timestamp};

/// Point-in-time view of every subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub taken_at: Timestamp,
    pub identities: IdentityMetrics,
    pub policies: PolicyMetrics,
    pub circuits: Vec<CircuitBreakerState>,
    pub open_circuits: usize,
    pub partitions: Vec<PartitionSnapshot>,
    pub total_partition_load: usize,
    pub consumers: Vec<ConsumerState>,
    pub live_consumers: usize,
    pub dead_letters: usize,
    /// Unresolved alerts by severity
    pub open_alerts: BTreeMap<Severity, usize>,
    pub audit: AuditMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetrics {
    pub active: usize,
    pub verified: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMetrics {
    pub version: u64,
    pub installed: usize,
    pub active: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetrics {
    pub entries: usize,
    pub last_sequence: u64,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Scoring and authorization result for one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub score: FraudScore,
    pub classification: RiskClassification,
    pub decision: Decision,
    /// Sequence id of the `policy_decision` audit entry
    pub audit_sequence: u64,
}

/// Record of one end-to-end `simulate_flow` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub identity: Identity,
    /// `false` when the credential already had a live identity
    pub issued: bool,
    pub assessment: Assessment,
    pub event_type: String,
    /// Publish receipt; `None` when the partition pushed back
    pub published: Option<Ack>,
    pub rejection: Option<String>,
    /// First and last audit sequence ids appended while the flow ran.
    /// Concurrent callers may interleave entries inside the range.
    pub audit_range: (u64, u64),
}
