//! # Demo Traffic
//!
//! Synthetic requests for `--demo` mode. This is the only place the runtime
//! draws randomness; the control plane itself is deterministic.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared_types::Region;

/// Downstream services the demo pretends to call.
pub const DEMO_SERVICES: [&str; 3] = ["payments-service", "ledger-service", "sms-gateway"];

/// One synthetic request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficRequest {
    pub credential: String,
    pub region: String,
    pub amount: u64,
    pub service_id: String,
    /// Whether the downstream call should succeed
    pub service_healthy: bool,
}

pub trait TrafficGenerator: Send {
    fn next_request(&mut self) -> TrafficRequest;
}

/// Seeded generator: the same seed yields the same request sequence.
pub struct RandomTrafficGenerator {
    rng: StdRng,
    credentials: Vec<String>,
    regions: Vec<String>,
    /// Probability that a downstream call fails
    failure_rate: f64,
    /// Probability that a request is a large transfer
    large_rate: f64,
}

impl RandomTrafficGenerator {
    /// A pool of `population` subscribers spread across `regions`.
    pub fn new(seed: u64, regions: Vec<String>, population: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let credentials = (0..population.max(1))
            .map(|_| format!("2547{:08}", rng.gen_range(0..100_000_000u32)))
            .collect();
        let regions = if regions.is_empty() {
            Region::catalog().map(|r| r.as_str().to_string()).collect()
        } else {
            regions
        };
        Self {
            rng,
            credentials,
            regions,
            failure_rate: 0.05,
            large_rate: 0.02,
        }
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_large_rate(mut self, rate: f64) -> Self {
        self.large_rate = rate.clamp(0.0, 1.0);
        self
    }
}

impl TrafficGenerator for RandomTrafficGenerator {
    fn next_request(&mut self) -> TrafficRequest {
        let credential = self
            .credentials
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();
        let region = self.regions.choose(&mut self.rng).cloned().unwrap_or_default();
        let amount = if self.rng.gen_bool(self.large_rate) {
            self.rng.gen_range(1_000_001..5_000_000)
        } else {
            self.rng.gen_range(100..50_000)
        };
        let service_id = DEMO_SERVICES
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(DEMO_SERVICES[0])
            .to_string();
        let service_healthy = !self.rng.gen_bool(self.failure_rate);

        TrafficRequest {
            credential,
            region,
            amount,
            service_id,
            service_healthy,
        }
    }
}
