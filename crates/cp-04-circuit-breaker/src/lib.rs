//! # cp-04-circuit-breaker
//!
//! Protects downstream calls with one breaker per service id.
//!
//! ```text
//!                    success (probe)
//!            ┌─────────────────────────────────────────┐
//!            ▼                                         │
//!      ┌──────────┐  failures    ┌──────────┐ timeout ┌──────────┐
//!      │  CLOSED  │ ───────────► │   OPEN   │ ──────► │HALF-OPEN │
//!      │ (normal) │  >= thresh   │ (reject) │ 1st CAS │ (1 probe)│
//!      └──────────┘              └──────────┘         └──────────┘
//!                                      ▲                    │
//!                                      └────────────────────┘
//!                                        failure (probe)
//! ```
//!
//! ## Guarantees
//!
//! - Open breakers fail fast with [`CircuitBreakerError::CircuitOpen`]; no
//!   downstream attempt is made.
//! - Exactly one caller is admitted as the half-open probe: the one whose
//!   compare-and-swap from Open to HalfOpen succeeds.
//! - `record_success` / `record_failure` (and the operator `reset`) are the
//!   only entry points that change state; `state()` never mutates and never
//!   creates a breaker.
//!
//! Each breaker is a handful of atomics; the registry map is touched only to
//! locate it, so unrelated services never contend.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::config::{CircuitBreakerConfig, ServiceOverride};
pub use domain::state::{Admission, CircuitBreakerState, CircuitState, RecordOutcome, Transition};
pub use error::{BreakerConfigError, CallError, CircuitBreakerError, CircuitBreakerResult};
pub use ports::outbound::TransitionSink;
pub use service::CircuitBreakerRegistry;
