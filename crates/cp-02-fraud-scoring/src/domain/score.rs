//! Fraud score value types.

use serde::{Deserialize, Serialize};
use shared_types::RiskClassification;

/// Per-factor contributions, each in `0.0..=100.0` before weighting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactorBreakdown {
    pub credential_age: f64,
    pub location_velocity: f64,
    pub pattern_deviation: f64,
}

/// Composite fraud score.
///
/// INVARIANT: `value <= 100`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FraudScore {
    pub value: u8,
    pub factors: FactorBreakdown,
}

impl FraudScore {
    pub fn classification(&self) -> RiskClassification {
        RiskClassification::from_score(self.value)
    }
}
