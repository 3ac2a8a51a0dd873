//! # Control Runtime Library
//!
//! Wires the subsystems into a single [`ControlPlane`] and exposes the
//! runtime pieces the binary and the integration tests drive.
//!
//! ## Layout
//!
//! - `container/` - configuration and the `ControlPlane` itself
//! - `adapters/` - outbound port implementations and alert texts
//! - `handlers/` - consumer workers and periodic background tasks
//! - `snapshot` - read models handed to dashboards
//! - `traffic` - seeded demo traffic
//!
//! ## Subsystems
//!
//! 1. Identity (cp-01) - credential-keyed identities with expiry
//! 2. Fraud Scoring (cp-02) - composite risk scores
//! 3. Policy Engine (cp-03) - hot-swappable authorization rules
//! 4. Circuit Breaker (cp-04) - per-service failure isolation
//! 5. Event Streaming (cp-05) - regional partitions and consumer supervision

#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod snapshot;
pub mod traffic;

pub use container::{ConfigError, ControlPlane, ControlPlaneConfig};
pub use snapshot::{Assessment, MetricsSnapshot, Trace};
pub use traffic::{RandomTrafficGenerator, TrafficGenerator, TrafficRequest};
