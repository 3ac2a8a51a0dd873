//! Circuit Breaker Registry

use crate::domain::circuit::{Acquire, ServiceCircuit};
use crate::domain::config::CircuitBreakerConfig;
use crate::domain::state::{Admission, CircuitBreakerState, CircuitState, RecordOutcome, Transition};
use crate::error::{BreakerConfigError, CallError, CircuitBreakerError, CircuitBreakerResult};
use crate::ports::outbound::TransitionSink;
use dashmap::DashMap;
use shared_types::TimeSource;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-service circuit breakers, created lazily on first use.
///
/// The map is only touched to find a service's circuit; all state changes
/// happen on that circuit's atomics.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: DashMap<String, Arc<ServiceCircuit>>,
    clock: Arc<dyn TimeSource>,
    sink: Option<Arc<dyn TransitionSink>>,
}

impl CircuitBreakerRegistry {
    pub fn new(
        config: CircuitBreakerConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self, BreakerConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            circuits: DashMap::new(),
            clock,
            sink: None,
        })
    }

    /// Report every transition to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn circuit(&self, service_id: &str) -> Arc<ServiceCircuit> {
        if let Some(existing) = self.circuits.get(service_id) {
            return Arc::clone(existing.value());
        }
        let entry = self
            .circuits
            .entry(service_id.to_string())
            .or_insert_with(|| {
                let (threshold, timeout) = self.config.for_service(service_id);
                debug!(service = service_id, threshold, timeout_ms = timeout, "Circuit created");
                Arc::new(ServiceCircuit::new(service_id, threshold, timeout))
            });
        Arc::clone(entry.value())
    }

    fn publish(&self, circuit: &ServiceCircuit, transition: &Option<Transition>) -> CircuitBreakerState {
        let state = circuit.snapshot();
        if let Some(t) = transition {
            match t.to {
                CircuitState::Open => warn!(
                    service = %t.service_id,
                    from = %t.from,
                    failures = state.failure_count,
                    timeout_ms = state.reset_timeout_ms,
                    "Circuit breaker opened"
                ),
                _ => info!(service = %t.service_id, from = %t.from, to = %t.to, "Circuit breaker transition"),
            }
            if let Some(sink) = &self.sink {
                sink.on_transition(t, &state);
            }
        }
        state
    }

    /// Ask for a call slot. Open circuits fail fast; after the reset timeout
    /// the first caller becomes the half-open probe and everyone else is
    /// rejected until it reports or its lease of one reset timeout runs out.
    pub fn try_acquire(&self, service_id: &str) -> CircuitBreakerResult<Admission> {
        let circuit = self.circuit(service_id);
        let (acquire, transition) = circuit.try_acquire(self.clock.now());
        self.publish(&circuit, &transition);
        match acquire {
            Acquire::Admitted => Ok(Admission {
                probe: false,
                transition,
            }),
            Acquire::Probe => Ok(Admission {
                probe: true,
                transition,
            }),
            Acquire::Rejected(retry_after_ms) => {
                debug!(service = service_id, retry_after_ms, "Circuit open, call rejected");
                Err(CircuitBreakerError::CircuitOpen {
                    service_id: service_id.to_string(),
                    retry_after_ms,
                })
            }
        }
    }

    pub fn record_success(&self, service_id: &str) -> RecordOutcome {
        let circuit = self.circuit(service_id);
        let transition = circuit.record_success(self.clock.now());
        let state = self.publish(&circuit, &transition);
        RecordOutcome { state, transition }
    }

    pub fn record_failure(&self, service_id: &str) -> RecordOutcome {
        let circuit = self.circuit(service_id);
        let transition = circuit.record_failure(self.clock.now());
        let state = self.publish(&circuit, &transition);
        RecordOutcome { state, transition }
    }

    /// Record an already-completed call.
    pub fn record(&self, service_id: &str, success: bool) -> RecordOutcome {
        if success {
            self.record_success(service_id)
        } else {
            self.record_failure(service_id)
        }
    }

    /// Acquire, run the call, record its result.
    pub async fn call<F, Fut, T, E>(&self, service_id: &str, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire(service_id).map_err(|err| match err {
            CircuitBreakerError::CircuitOpen {
                service_id,
                retry_after_ms,
            } => CallError::CircuitOpen {
                service_id,
                retry_after_ms,
            },
        })?;

        match f().await {
            Ok(value) => {
                self.record_success(service_id);
                Ok(value)
            }
            Err(err) => {
                self.record_failure(service_id);
                Err(CallError::Inner(err))
            }
        }
    }

    /// Current state without creating or mutating anything. Unknown services
    /// report a fresh closed breaker with their configured limits.
    pub fn state(&self, service_id: &str) -> CircuitBreakerState {
        match self.circuits.get(service_id) {
            Some(circuit) => circuit.snapshot(),
            None => {
                let (threshold, reset_timeout_ms) = self.config.for_service(service_id);
                CircuitBreakerState {
                    service_id: service_id.to_string(),
                    state: CircuitState::Closed,
                    failure_count: 0,
                    last_failure_time: None,
                    threshold,
                    reset_timeout_ms,
                    total_successes: 0,
                    total_failures: 0,
                    total_rejections: 0,
                }
            }
        }
    }

    /// Every known breaker, sorted by service id.
    pub fn snapshot(&self) -> Vec<CircuitBreakerState> {
        let mut states: Vec<_> = self.circuits.iter().map(|c| c.snapshot()).collect();
        states.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        states
    }

    /// Operator override: force a known breaker back to Closed.
    pub fn reset(&self, service_id: &str) -> Option<RecordOutcome> {
        let circuit = self.circuits.get(service_id).map(|c| Arc::clone(c.value()))?;
        let transition = circuit.reset(self.clock.now());
        info!(service = service_id, "Circuit breaker manually reset");
        let state = self.publish(&circuit, &transition);
        Some(RecordOutcome { state, transition })
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.circuits
            .iter()
            .filter(|c| c.state() != CircuitState::Closed)
            .count()
    }
}
