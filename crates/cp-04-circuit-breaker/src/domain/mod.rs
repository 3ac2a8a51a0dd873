//! Circuit breaker domain: states, configuration and the atomic circuit.

pub mod circuit;
pub mod config;
pub mod state;
