//! Lock-free per-service circuit.
//!
//! State, failure count and last failure time are independent atomics. Every
//! state change is a compare-and-swap on `state`, so exactly one caller wins
//! each transition. `last_failure` is written before the CAS that publishes
//! an Open state, so any thread that observes Open also observes the stamp.
//!
//! The half-open probe holds a lease of `reset_timeout_ms`. A probe that never
//! reports (a dropped call future, an acquire with no record) loses the slot
//! when the lease runs out and the next caller becomes the probe.

use super::state::{CircuitBreakerState, CircuitState, Transition};
use shared_types::Timestamp;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use tracing::debug;

const NO_FAILURE: u64 = u64::MAX;
const NO_PROBE: u64 = u64::MAX;

/// Outcome of an admission attempt at the circuit level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// Closed circuit, normal call.
    Admitted,
    /// This caller is the sole probe: it won the Open -> HalfOpen CAS or
    /// took over an expired probe lease.
    Probe,
    /// Rejected; the value is the remaining wait in ms (0 while a probe is
    /// in flight).
    Rejected(u64),
}

#[derive(Debug)]
pub struct ServiceCircuit {
    service_id: String,
    threshold: u32,
    reset_timeout_ms: u64,
    state: AtomicU8,
    failures: AtomicU32,
    last_failure: AtomicU64,
    probe_started: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
    total_rejections: AtomicU64,
}

impl ServiceCircuit {
    pub fn new(service_id: impl Into<String>, threshold: u32, reset_timeout_ms: u64) -> Self {
        Self {
            service_id: service_id.into(),
            threshold: threshold.max(1),
            reset_timeout_ms,
            state: AtomicU8::new(CircuitState::CLOSED),
            failures: AtomicU32::new(0),
            last_failure: AtomicU64::new(NO_FAILURE),
            probe_started: AtomicU64::new(NO_PROBE),
            total_successes: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            total_rejections: AtomicU64::new(0),
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn timeout_elapsed(&self, now: Timestamp) -> (bool, u64) {
        let last = self.last_failure.load(Ordering::Acquire);
        if last == NO_FAILURE {
            return (true, 0);
        }
        let elapsed = now.saturating_sub(last);
        if elapsed >= self.reset_timeout_ms {
            (true, 0)
        } else {
            (false, self.reset_timeout_ms - elapsed)
        }
    }

    fn cas(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn transition(&self, from: CircuitState, to: CircuitState, at: Timestamp) -> Transition {
        Transition {
            service_id: self.service_id.clone(),
            from,
            to,
            at,
        }
    }

    pub fn try_acquire(&self, now: Timestamp) -> (Acquire, Option<Transition>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                CircuitState::CLOSED => return (Acquire::Admitted, None),
                CircuitState::OPEN => {
                    let (elapsed, remaining) = self.timeout_elapsed(now);
                    if !elapsed {
                        self.total_rejections.fetch_add(1, Ordering::Relaxed);
                        return (Acquire::Rejected(remaining), None);
                    }
                    if self.cas(CircuitState::OPEN, CircuitState::HALF_OPEN) {
                        self.probe_started.store(now, Ordering::Release);
                        let t = self.transition(CircuitState::Open, CircuitState::HalfOpen, now);
                        return (Acquire::Probe, Some(t));
                    }
                    // Lost the race; re-read and fall into HalfOpen (or
                    // whatever the winner left behind).
                }
                _ => {
                    if self.take_expired_probe(now) {
                        debug!(service = %self.service_id, "Half-open probe lease expired, reassigned");
                        return (Acquire::Probe, None);
                    }
                    self.total_rejections.fetch_add(1, Ordering::Relaxed);
                    return (Acquire::Rejected(0), None);
                }
            }
        }
    }

    /// Claim the probe slot if the current probe has held it for a full
    /// reset timeout. At most one caller wins each expired lease.
    fn take_expired_probe(&self, now: Timestamp) -> bool {
        let started = self.probe_started.load(Ordering::Acquire);
        // NO_PROBE: the Open -> HalfOpen winner has not stamped its lease yet.
        if started == NO_PROBE || now.saturating_sub(started) < self.reset_timeout_ms {
            return false;
        }
        self.probe_started
            .compare_exchange(started, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn record_success(&self, now: Timestamp) -> Option<Transition> {
        loop {
            match self.state.load(Ordering::Acquire) {
                CircuitState::CLOSED => {
                    self.total_successes.fetch_add(1, Ordering::Relaxed);
                    self.failures.store(0, Ordering::Release);
                    return None;
                }
                CircuitState::HALF_OPEN => {
                    if self.cas(CircuitState::HALF_OPEN, CircuitState::CLOSED) {
                        self.total_successes.fetch_add(1, Ordering::Relaxed);
                        self.failures.store(0, Ordering::Release);
                        return Some(self.transition(CircuitState::HalfOpen, CircuitState::Closed, now));
                    }
                }
                _ => {
                    // Open: a success after the timeout counts as a probe
                    // success; within the timeout it is ignored.
                    if !self.timeout_elapsed(now).0 {
                        return None;
                    }
                    if self.cas(CircuitState::OPEN, CircuitState::CLOSED) {
                        self.total_successes.fetch_add(1, Ordering::Relaxed);
                        self.failures.store(0, Ordering::Release);
                        return Some(self.transition(CircuitState::Open, CircuitState::Closed, now));
                    }
                }
            }
        }
    }

    pub fn record_failure(&self, now: Timestamp) -> Option<Transition> {
        loop {
            match self.state.load(Ordering::Acquire) {
                CircuitState::CLOSED => {
                    self.total_failures.fetch_add(1, Ordering::Relaxed);
                    let threshold = self.threshold;
                    let previous = self
                        .failures
                        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                            Some(n.saturating_add(1).min(threshold))
                        })
                        .unwrap_or(threshold);
                    // Only the caller that moved the count onto the threshold
                    // opens the circuit and stamps it; later callers that
                    // found it saturated leave the stamp alone.
                    if previous >= threshold || previous.saturating_add(1) < threshold {
                        return None;
                    }
                    self.last_failure.store(now, Ordering::Release);
                    if self.cas(CircuitState::CLOSED, CircuitState::OPEN) {
                        return Some(self.transition(CircuitState::Closed, CircuitState::Open, now));
                    }
                    return None;
                }
                CircuitState::HALF_OPEN => {
                    self.last_failure.store(now, Ordering::Release);
                    if self.cas(CircuitState::HALF_OPEN, CircuitState::OPEN) {
                        self.total_failures.fetch_add(1, Ordering::Relaxed);
                        return Some(self.transition(CircuitState::HalfOpen, CircuitState::Open, now));
                    }
                }
                _ => {
                    // Open: a failure after the timeout is a failed probe and
                    // re-arms the timeout; within it the report is ignored.
                    if self.timeout_elapsed(now).0 {
                        self.total_failures.fetch_add(1, Ordering::Relaxed);
                        self.last_failure.store(now, Ordering::Release);
                    }
                    return None;
                }
            }
        }
    }

    /// Operator override back to Closed.
    pub fn reset(&self, now: Timestamp) -> Option<Transition> {
        let previous = self.state.swap(CircuitState::CLOSED, Ordering::AcqRel);
        self.failures.store(0, Ordering::Release);
        self.last_failure.store(NO_FAILURE, Ordering::Release);
        self.probe_started.store(NO_PROBE, Ordering::Release);
        (previous != CircuitState::CLOSED).then(|| {
            self.transition(CircuitState::from_u8(previous), CircuitState::Closed, now)
        })
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let last = self.last_failure.load(Ordering::Acquire);
        CircuitBreakerState {
            service_id: self.service_id.clone(),
            state: self.state(),
            failure_count: self.failures.load(Ordering::Acquire),
            last_failure_time: (last != NO_FAILURE).then_some(last),
            threshold: self.threshold,
            reset_timeout_ms: self.reset_timeout_ms,
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }
}
