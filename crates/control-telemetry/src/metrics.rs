//! Prometheus metrics for the control plane.
//!
//! All metrics follow the naming convention: `cp_<subject>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., cp_events_published_total)
//! - **Gauge**: Value that can go up or down (e.g., cp_dead_letters_pending)
//! - **Histogram**: Distribution of values (e.g., cp_policy_evaluation_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Identities freshly issued (idempotent re-issues are not counted)
    pub static ref IDENTITIES_ISSUED: Counter = Counter::new(
        "cp_identities_issued_total",
        "Total number of identities issued"
    ).expect("metric creation failed");

    // =========================================================================
    // AUTHORIZATION
    // =========================================================================

    /// Policy decisions by outcome
    pub static ref POLICY_DECISIONS: CounterVec = CounterVec::new(
        Opts::new("cp_policy_decisions_total", "Policy decisions by outcome"),
        &["outcome"]  // outcome: allow/deny/review
    ).expect("metric creation failed");

    /// Time spent scoring and evaluating one transaction
    pub static ref POLICY_EVALUATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "cp_policy_evaluation_duration_seconds",
            "Time spent scoring and evaluating a transaction"
        ).buckets(exponential_buckets(0.00001, 2.0, 15).expect("valid buckets"))
    ).expect("metric creation failed");

    /// Transactions scored as critical fraud risk
    pub static ref FRAUD_CRITICAL: Counter = Counter::new(
        "cp_fraud_critical_total",
        "Total transactions classified as critical fraud risk"
    ).expect("metric creation failed");

    // =========================================================================
    // TRAFFIC CONTROL
    // =========================================================================

    /// Circuit breaker transitions
    pub static ref CIRCUIT_TRANSITIONS: CounterVec = CounterVec::new(
        Opts::new("cp_circuit_transitions_total", "Circuit breaker state transitions"),
        &["service", "to"]  // to: closed/open/half_open
    ).expect("metric creation failed");

    /// Breakers currently open
    pub static ref CIRCUITS_OPEN: Gauge = Gauge::new(
        "cp_circuits_open",
        "Number of circuit breakers currently open"
    ).expect("metric creation failed");

    // =========================================================================
    // STREAMING
    // =========================================================================

    /// Events accepted into a partition
    pub static ref EVENTS_PUBLISHED: Counter = Counter::new(
        "cp_events_published_total",
        "Total events accepted into a partition"
    ).expect("metric creation failed");

    /// Publishes rejected by a full partition
    pub static ref PARTITION_REJECTIONS: CounterVec = CounterVec::new(
        Opts::new("cp_partition_rejections_total", "Publishes rejected because the partition was full"),
        &["partition"]
    ).expect("metric creation failed");

    /// Events moved to the dead-letter store
    pub static ref DEAD_LETTERS: Counter = Counter::new(
        "cp_dead_letters_total",
        "Total events dead-lettered"
    ).expect("metric creation failed");

    /// Dead letters awaiting an operator
    pub static ref DEAD_LETTERS_PENDING: Gauge = Gauge::new(
        "cp_dead_letters_pending",
        "Dead letters currently retained"
    ).expect("metric creation failed");

    // =========================================================================
    // ALERTS
    // =========================================================================

    /// Alerts raised by severity
    pub static ref ALERTS_RAISED: CounterVec = CounterVec::new(
        Opts::new("cp_alerts_raised_total", "Alerts raised by severity"),
        &["severity"]
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Identity
        Box::new(IDENTITIES_ISSUED.clone()),
        // Authorization
        Box::new(POLICY_DECISIONS.clone()),
        Box::new(POLICY_EVALUATION_DURATION.clone()),
        Box::new(FRAUD_CRITICAL.clone()),
        // Traffic control
        Box::new(CIRCUIT_TRANSITIONS.clone()),
        Box::new(CIRCUITS_OPEN.clone()),
        // Streaming
        Box::new(EVENTS_PUBLISHED.clone()),
        Box::new(PARTITION_REJECTIONS.clone()),
        Box::new(DEAD_LETTERS.clone()),
        Box::new(DEAD_LETTERS_PENDING.clone()),
        // Alerts
        Box::new(ALERTS_RAISED.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Render every registered metric in the Prometheus text exposition format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    register_metrics()?;

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
