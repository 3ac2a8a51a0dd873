//! # Alert Subscriber
//!
//! Defines the subscription side of the alert bus.

use crate::events::Alert;
use shared_types::Severity;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The alert bus was dropped.
    #[error("Alert bus closed")]
    Closed,
}

/// A subscription handle receiving alerts at or above a severity floor.
pub struct AlertSubscription {
    receiver: broadcast::Receiver<Alert>,
    min_severity: Severity,
}

impl AlertSubscription {
    pub(crate) fn new(receiver: broadcast::Receiver<Alert>, min_severity: Severity) -> Self {
        Self {
            receiver,
            min_severity,
        }
    }

    /// Receive the next alert that passes the severity floor.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<Alert> {
        loop {
            let alert = match self.receiver.recv().await {
                Ok(a) => a,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Alert subscriber lagged, some alerts dropped");
                    continue;
                }
            };

            if alert.severity >= self.min_severity {
                return Some(alert);
            }
        }
    }

    /// Try to receive the next matching alert without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Alert>, SubscriptionError> {
        loop {
            let alert = match self.receiver.try_recv() {
                Ok(a) => a,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if alert.severity >= self.min_severity {
                return Ok(Some(alert));
            }
        }
    }

    pub fn min_severity(&self) -> Severity {
        self.min_severity
    }
}

/// A stream wrapper for alert subscriptions.
pub struct AlertStream {
    subscription: AlertSubscription,
}

impl AlertStream {
    #[must_use]
    pub fn new(subscription: AlertSubscription) -> Self {
        Self { subscription }
    }
}

impl Stream for AlertStream {
    type Item = Alert;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.subscription.try_recv() {
            Ok(Some(alert)) => Poll::Ready(Some(alert)),
            Ok(None) => {
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(SubscriptionError::Closed) => Poll::Ready(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::events::AlertType;
    use crate::publisher::AlertBus;
    use shared_types::{LocalizedMessage, Severity};
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    fn msg() -> LocalizedMessage {
        LocalizedMessage::new("msg", "ujumbe")
    }

    #[tokio::test]
    async fn test_severity_floor_filters() {
        let bus = AlertBus::new();
        let mut sub = bus.subscribe(Severity::High);

        bus.raise(1, Severity::Warning, AlertType::PartitionOverloaded, msg(), "p0");
        bus.raise(2, Severity::Critical, AlertType::FraudCritical, msg(), "id-1");

        let received = timeout(Duration::from_millis(100), sub.recv())
            .await
            .expect("timeout")
            .expect("alert");
        assert_eq!(received.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = AlertBus::new();
        let mut sub = bus.subscribe(Severity::Info);
        assert!(matches!(sub.try_recv(), Ok(None)));
    }

    #[tokio::test]
    async fn test_stream_yields_alerts() {
        let bus = AlertBus::new();
        let mut stream = bus.stream(Severity::Info);

        bus.raise(1, Severity::Info, AlertType::TransactionReview, msg(), "id-2");

        let next = timeout(Duration::from_millis(100), stream.next())
            .await
            .expect("timeout")
            .expect("alert");
        assert_eq!(next.subject_ref, "id-2");
    }

    #[test]
    fn test_closed_bus() {
        let bus = AlertBus::new();
        let mut sub = bus.subscribe(Severity::Info);
        drop(bus);
        assert!(sub.try_recv().is_err());
    }
}
