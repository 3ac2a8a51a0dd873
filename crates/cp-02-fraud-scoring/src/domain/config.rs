//! Fraud scoring configuration and validation

use crate::error::{FraudError, FraudResult};
use serde::{Deserialize, Serialize};

/// Fraud scorer configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Weight of the credential age factor
    pub age_weight: f64,
    /// Weight of the location velocity factor
    pub velocity_weight: f64,
    /// Weight of the pattern deviation factor
    pub pattern_weight: f64,
    /// Travel speed above which a location jump scores maximum risk (km/h)
    pub max_plausible_speed_kmh: f64,
    /// Transactions retained per identity for pattern analysis
    pub history_window: usize,
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            age_weight: 0.30,
            velocity_weight: 0.35,
            pattern_weight: 0.35,
            max_plausible_speed_kmh: 900.0, // commercial airliner
            history_window: 256,
        }
    }
}

impl FraudConfig {
    pub fn validate(&self) -> FraudResult<()> {
        for (name, value) in [
            ("age_weight", self.age_weight),
            ("velocity_weight", self.velocity_weight),
            ("pattern_weight", self.pattern_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(FraudError::InvalidWeight { name, value });
            }
        }
        if self.weight_sum() <= 0.0 {
            return Err(FraudError::ZeroWeights);
        }
        if !self.max_plausible_speed_kmh.is_finite() || self.max_plausible_speed_kmh <= 0.0 {
            return Err(FraudError::InvalidSpeed(self.max_plausible_speed_kmh));
        }
        if self.history_window == 0 {
            return Err(FraudError::EmptyHistoryWindow);
        }
        Ok(())
    }

    pub(crate) fn weight_sum(&self) -> f64 {
        self.age_weight + self.velocity_weight + self.pattern_weight
    }
}
