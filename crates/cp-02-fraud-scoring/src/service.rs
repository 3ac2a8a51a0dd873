//! Fraud Scorer - composite scoring service

use crate::domain::config::FraudConfig;
use crate::domain::factors::{
    credential_age_factor, location_velocity_factor, pattern_deviation_factor,
};
use crate::domain::score::{FactorBreakdown, FraudScore};
use crate::error::FraudResult;
use shared_types::{Identity, RiskClassification, Transaction};
use tracing::debug;

/// Map a score onto its risk band.
pub fn classify(score: u8) -> RiskClassification {
    RiskClassification::from_score(score)
}

/// Stateless composite scorer.
#[derive(Clone, Debug, Default)]
pub struct FraudScorer {
    config: FraudConfig,
}

impl FraudScorer {
    /// Build a scorer after validating the configuration.
    pub fn new(config: FraudConfig) -> FraudResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    /// Score `transaction` for `identity` against its prior `history`.
    ///
    /// Never fails. Weights are normalised, so the result is always within
    /// `0..=100`.
    pub fn score(
        &self,
        identity: &Identity,
        transaction: &Transaction,
        history: &[Transaction],
    ) -> FraudScore {
        let factors = FactorBreakdown {
            credential_age: credential_age_factor(identity, transaction.timestamp),
            location_velocity: location_velocity_factor(
                transaction.location,
                transaction.timestamp,
                history,
                self.config.max_plausible_speed_kmh,
            ),
            pattern_deviation: pattern_deviation_factor(
                transaction.amount,
                transaction.timestamp,
                history,
            ),
        };

        let weighted = self.config.age_weight * factors.credential_age
            + self.config.velocity_weight * factors.location_velocity
            + self.config.pattern_weight * factors.pattern_deviation;
        let value = (weighted / self.config.weight_sum()).round().clamp(0.0, 100.0) as u8;

        debug!(
            identity_id = %identity.id,
            score = value,
            age = factors.credential_age,
            velocity = factors.location_velocity,
            pattern = factors.pattern_deviation,
            "Transaction scored"
        );

        FraudScore { value, factors }
    }
}
