//! Driven Ports (SPI - Outbound)

use crate::domain::state::{CircuitBreakerState, Transition};

/// Receives every breaker state change, whichever entry point caused it.
pub trait TransitionSink: Send + Sync {
    fn on_transition(&self, transition: &Transition, state: &CircuitBreakerState);
}
