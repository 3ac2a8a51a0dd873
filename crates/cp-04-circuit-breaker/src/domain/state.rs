//! Circuit states, snapshots and transitions.

use serde::{Deserialize, Serialize};
use shared_types::Timestamp;
use std::fmt;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - calls pass through
    Closed,
    /// Calls are rejected immediately
    Open,
    /// A single probe call is in flight
    HalfOpen,
}

impl CircuitState {
    pub(crate) const CLOSED: u8 = 0;
    pub(crate) const OPEN: u8 = 1;
    pub(crate) const HALF_OPEN: u8 = 2;

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            Self::OPEN => CircuitState::Open,
            Self::HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one service's breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub service_id: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<Timestamp>,
    pub threshold: u32,
    pub reset_timeout_ms: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// A state change, reported so callers can audit and alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub service_id: String,
    pub from: CircuitState,
    pub to: CircuitState,
    pub at: Timestamp,
}

/// Result of a `record_*` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    pub state: CircuitBreakerState,
    pub transition: Option<Transition>,
}

/// A granted call slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// `true` when this caller is the half-open probe.
    pub probe: bool,
    pub transition: Option<Transition>,
}
