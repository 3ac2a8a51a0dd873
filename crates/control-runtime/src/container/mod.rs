//! # Control Plane Container
//!
//! Builds every subsystem from one [`ControlPlaneConfig`] and owns the
//! resulting stores.
//!
//! ## Construction Order
//!
//! - Shared infrastructure first: audit log, alert bus
//! - Authorization path: identity issuer, history store, scorer, policy engine
//! - Traffic control: breaker registry (with the auditing sink), partitions,
//!   dead-letter store, consumer supervisor

pub mod config;
pub mod control_plane;

pub use config::{AlertConfig, ConfigError, ControlPlaneConfig, RuntimeConfig};
pub use control_plane::{
    event_type_for, ControlPlane, EVENT_TRANSACTION_AUTHORIZED, EVENT_TRANSACTION_DECLINED,
    EVENT_TRANSACTION_HELD,
};
