//! # Shared Bus - Audit Log and Alert Bus
//!
//! Every identity issuance, policy decision, breaker transition, partition
//! overload and dead-letter event is appended to the [`AuditLog`]. Conditions
//! that need an operator are additionally raised on the [`AlertBus`].
//!
//! ```text
//! ┌──────────────┐   append()    ┌──────────────┐
//! │ ControlPlane │ ────────────→ │  Audit Log   │  (append-only, monotonic seq)
//! │              │               └──────────────┘
//! │              │   raise()     ┌──────────────┐  subscribe()  ┌───────────┐
//! │              │ ────────────→ │  Alert Bus   │ ────────────→ │ Dashboard │
//! └──────────────┘               └──────────────┘               └───────────┘
//! ```
//!
//! The only mutation an alert accepts after being raised is `resolve()`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod audit;
pub mod events;
pub mod publisher;
pub mod subscriber;

pub use audit::{AuditEntry, AuditLog};
pub use events::{Alert, AlertId, AlertQuery, AlertType, AuditEventKind};
pub use publisher::{AlertBus, AlertError};
pub use subscriber::{AlertStream, AlertSubscription, SubscriptionError};

/// Maximum alerts buffered per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(DEFAULT_CHANNEL_CAPACITY, 1000);
    }
}
