//! # Alert Bus
//!
//! Stores raised alerts for querying and fans them out to live subscribers.

use crate::events::{Alert, AlertId, AlertQuery, AlertType};
use crate::subscriber::{AlertStream, AlertSubscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use shared_types::{LocalizedMessage, Severity, Timestamp};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors from alert operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlertError {
    #[error("Alert not found: {0}")]
    NotFound(AlertId),
}

/// In-memory alert bus.
///
/// Uses `tokio::sync::broadcast` for live fan-out, like a dashboard feed,
/// and keeps every alert so it can be queried by window and severity.
pub struct AlertBus {
    sender: broadcast::Sender<Alert>,
    alerts: RwLock<Vec<Alert>>,
    alerts_raised: AtomicU64,
    capacity: usize,
}

impl AlertBus {
    /// Create a new alert bus with default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new alert bus with the given subscriber channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            alerts: RwLock::new(Vec::new()),
            alerts_raised: AtomicU64::new(0),
            capacity,
        }
    }

    /// Raise an alert. It is stored before being broadcast.
    pub fn raise(
        &self,
        timestamp: Timestamp,
        severity: Severity,
        alert_type: AlertType,
        message: LocalizedMessage,
        subject_ref: impl Into<String>,
    ) -> Alert {
        let alert = Alert {
            id: Uuid::new_v4(),
            severity,
            alert_type,
            message,
            subject_ref: subject_ref.into(),
            timestamp,
            resolved: false,
            resolved_at: None,
        };

        self.alerts.write().push(alert.clone());
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);

        match severity {
            Severity::Critical | Severity::High => warn!(
                alert_id = %alert.id,
                severity = %severity,
                alert_type = ?alert_type,
                subject = %alert.subject_ref,
                "{}",
                alert.message.primary
            ),
            _ => info!(
                alert_id = %alert.id,
                severity = %severity,
                alert_type = ?alert_type,
                subject = %alert.subject_ref,
                "{}",
                alert.message.primary
            ),
        }

        // No subscribers is fine; the alert is already stored.
        if let Ok(receivers) = self.sender.send(alert.clone()) {
            debug!(alert_id = %alert.id, receivers, "Alert broadcast");
        }
        alert
    }

    /// Mark an alert resolved. Resolving an already-resolved alert is a no-op
    /// that returns the alert unchanged.
    pub fn resolve(&self, id: AlertId, at: Timestamp) -> Result<Alert, AlertError> {
        let mut alerts = self.alerts.write();
        let alert = alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AlertError::NotFound(id))?;

        if !alert.resolved {
            alert.resolved = true;
            alert.resolved_at = Some(at);
            info!(alert_id = %id, "Alert resolved");
        }
        Ok(alert.clone())
    }

    /// Look up one alert.
    pub fn get(&self, id: AlertId) -> Option<Alert> {
        self.alerts.read().iter().find(|a| a.id == id).cloned()
    }

    /// Alerts matching the query, oldest first.
    pub fn query(&self, query: &AlertQuery) -> Vec<Alert> {
        self.alerts
            .read()
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect()
    }

    /// Unresolved alert counts keyed by severity.
    pub fn open_count_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for alert in self.alerts.read().iter().filter(|a| !a.resolved) {
            *counts.entry(alert.severity).or_insert(0) += 1;
        }
        counts
    }

    /// Most recent `limit` alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.alerts.read().iter().rev().take(limit).cloned().collect()
    }

    /// Subscribe to alerts at or above `min_severity`.
    #[must_use]
    pub fn subscribe(&self, min_severity: Severity) -> AlertSubscription {
        debug!(min_severity = %min_severity, "New alert subscription");
        AlertSubscription::new(self.sender.subscribe(), min_severity)
    }

    /// Subscription wrapped as a `Stream`.
    #[must_use]
    pub fn stream(&self, min_severity: Severity) -> AlertStream {
        AlertStream::new(self.subscribe(min_severity))
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AlertBus {
    fn default() -> Self {
        Self::new()
    }
}
