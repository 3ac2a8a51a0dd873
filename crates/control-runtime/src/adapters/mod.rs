//! # Adapter Implementations
//!
//! Concrete implementations of the subsystems' outbound ports, plus the
//! alert texts they raise.
//!
//! ```text
//! ┌──────────────────────────┐  on_transition  ┌─────────────────────────┐
//! │ CircuitBreakerRegistry   │ ──────────────→ │ AuditingTransitionSink  │
//! │ (cp-04, TransitionSink)  │                 │  → AuditLog, AlertBus   │
//! └──────────────────────────┘                 └─────────────────────────┘
//! ```

pub mod messages;
pub mod transition_sink;

pub use transition_sink::AuditingTransitionSink;

use control_telemetry::ALERTS_RAISED;
use shared_bus::{Alert, AlertBus, AlertType};
use shared_types::{LocalizedMessage, Severity, Timestamp};

/// Raise on the bus and count it.
pub(crate) fn raise_alert(
    bus: &AlertBus,
    at: Timestamp,
    severity: Severity,
    alert_type: AlertType,
    message: LocalizedMessage,
    subject_ref: &str,
) -> Alert {
    ALERTS_RAISED
        .with_label_values(&[severity.to_string().as_str()])
        .inc();
    bus.raise(at, severity, alert_type, message, subject_ref)
}
