//! # cp-02-fraud-scoring
//!
//! Computes a composite 0..=100 fraud score for a transaction.
//!
//! ## Factors
//!
//! | Factor | Default weight | Signal |
//! |--------|----------------|--------|
//! | Credential age | 0.30 | `100 / (1 + age_days)`; brand-new identities are riskiest |
//! | Location velocity | 0.35 | great-circle speed since the last known location |
//! | Pattern deviation | 0.35 | amount versus historical mean, blended with burst frequency |
//!
//! ```text
//! score(identity, transaction, history)
//!     │
//!     ├── credential_age_factor ───┐
//!     ├── location_velocity_factor ├──→ weighted mean ──→ FraudScore { value, factors }
//!     └── pattern_deviation_factor ┘
//! ```
//!
//! The scorer is pure: no clock, no randomness, no I/O. Identical inputs
//! always produce the identical score. It never fails; missing data falls
//! back to a conservative per-factor default.

pub mod domain;
pub mod error;
pub mod service;

pub use domain::config::FraudConfig;
pub use domain::factors::{
    credential_age_factor, location_velocity_factor, pattern_deviation_factor,
};
pub use domain::history::TransactionHistoryStore;
pub use domain::score::{FactorBreakdown, FraudScore};
pub use error::{FraudError, FraudResult};
pub use service::{classify, FraudScorer};
