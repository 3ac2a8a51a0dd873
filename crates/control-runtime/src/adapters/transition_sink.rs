//! Breaker transitions → audit log, metrics and alerts.

use std::sync::Arc;

use control_telemetry::{CIRCUITS_OPEN, CIRCUIT_TRANSITIONS};
use cp_04_circuit_breaker::{CircuitBreakerState, CircuitState, Transition, TransitionSink};
use serde_json::json;
use shared_bus::{AlertBus, AlertType, AuditEventKind, AuditLog};
use shared_types::Severity;

use super::messages;
use super::raise_alert;

/// Implements the breaker's outbound [`TransitionSink`] port.
pub struct AuditingTransitionSink {
    audit: Arc<AuditLog>,
    alerts: Arc<AlertBus>,
}

impl AuditingTransitionSink {
    pub fn new(audit: Arc<AuditLog>, alerts: Arc<AlertBus>) -> Self {
        Self { audit, alerts }
    }
}

impl TransitionSink for AuditingTransitionSink {
    fn on_transition(&self, transition: &Transition, state: &CircuitBreakerState) {
        self.audit.append(
            transition.at,
            AuditEventKind::CircuitTransition,
            "circuit_breaker",
            json!({
                "service_id": transition.service_id,
                "from": transition.from,
                "to": transition.to,
                "failure_count": state.failure_count,
                "threshold": state.threshold,
            }),
        );
        CIRCUIT_TRANSITIONS
            .with_label_values(&[transition.service_id.as_str(), transition.to.as_str()])
            .inc();

        match (transition.from, transition.to) {
            (_, CircuitState::Open) if transition.from != CircuitState::Open => {
                CIRCUITS_OPEN.inc();
                raise_alert(
                    &self.alerts,
                    transition.at,
                    Severity::High,
                    AlertType::CircuitOpened,
                    messages::circuit_opened(&transition.service_id, state.failure_count),
                    &transition.service_id,
                );
            }
            (CircuitState::Open, _) => CIRCUITS_OPEN.dec(),
            _ => {}
        }
    }
}
