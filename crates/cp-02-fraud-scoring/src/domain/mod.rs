//! Fraud scoring domain: configuration, factor functions, score values and
//! the per-identity transaction history.

pub mod config;
pub mod factors;
pub mod history;
pub mod score;
