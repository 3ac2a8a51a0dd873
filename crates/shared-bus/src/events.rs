//! # Audit and Alert Events
//!
//! Kinds of audit entries and the alert value raised to operators.

use serde::{Deserialize, Serialize};
use shared_types::{LocalizedMessage, Severity, Timestamp};
use std::fmt;
use uuid::Uuid;

/// Every kind of record appended to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    // =========================================================================
    // IDENTITY
    // =========================================================================
    IdentityIssued,
    IdentityVerified,

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================
    PolicyDecision,
    PolicySetChanged,

    // =========================================================================
    // TRAFFIC CONTROL
    // =========================================================================
    CircuitTransition,

    // =========================================================================
    // STREAMING
    // =========================================================================
    PartitionOverloaded,
    DeadLettered,
    DeadLetterReplayed,
    ConsumerStatusChanged,

    // =========================================================================
    // OPERATOR
    // =========================================================================
    AlertResolved,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::IdentityIssued => "identity_issued",
            AuditEventKind::IdentityVerified => "identity_verified",
            AuditEventKind::PolicyDecision => "policy_decision",
            AuditEventKind::PolicySetChanged => "policy_set_changed",
            AuditEventKind::CircuitTransition => "circuit_transition",
            AuditEventKind::PartitionOverloaded => "partition_overloaded",
            AuditEventKind::DeadLettered => "dead_lettered",
            AuditEventKind::DeadLetterReplayed => "dead_letter_replayed",
            AuditEventKind::ConsumerStatusChanged => "consumer_status_changed",
            AuditEventKind::AlertResolved => "alert_resolved",
        }
    }
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    FraudCritical,
    TransactionDenied,
    TransactionReview,
    CircuitOpened,
    PartitionOverloaded,
    DeadLetterWatermark,
}

/// Unique alert identifier.
pub type AlertId = Uuid;

/// A severity-tagged alert. Mutable only through `AlertBus::resolve`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub message: LocalizedMessage,
    /// The entity the alert is about (identity id, service id, partition...).
    pub subject_ref: String,
    pub timestamp: Timestamp,
    pub resolved: bool,
    pub resolved_at: Option<Timestamp>,
}

/// Filter for alert queries. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertQuery {
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<Timestamp>,
    /// Exclusive upper bound on `timestamp`.
    pub until: Option<Timestamp>,
    pub min_severity: Option<Severity>,
    pub include_resolved: bool,
}

impl AlertQuery {
    /// Every alert, resolved or not.
    pub fn all() -> Self {
        Self {
            include_resolved: true,
            ..Self::default()
        }
    }

    /// Unresolved alerts at or above `severity`.
    pub fn open_at_least(severity: Severity) -> Self {
        Self {
            min_severity: Some(severity),
            ..Self::default()
        }
    }

    pub fn window(mut self, since: Timestamp, until: Timestamp) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if !self.include_resolved && alert.resolved {
            return false;
        }
        if self.since.is_some_and(|since| alert.timestamp < since) {
            return false;
        }
        if self.until.is_some_and(|until| alert.timestamp >= until) {
            return false;
        }
        self.min_severity
            .map_or(true, |min| alert.severity >= min)
    }
}
