//! # Integration Tests
//!
//! Scenarios drive the public `ControlPlane` interface or a single
//! subsystem's service with `ManualTimeSource`, so every run is
//! deterministic.

pub mod concurrency;
pub mod scenarios;

use std::sync::Arc;

use control_runtime::container::{ControlPlane, ControlPlaneConfig};
use shared_types::{ManualTimeSource, Timestamp};

/// Fixed start time shared by the scenarios.
pub const T0: Timestamp = 1_700_000_000_000;

/// A control plane on a manual clock starting at [`T0`].
pub fn control_plane(config: ControlPlaneConfig) -> (Arc<ControlPlane>, Arc<ManualTimeSource>) {
    let clock = Arc::new(ManualTimeSource::new(T0));
    let plane = ControlPlane::new(config, clock.clone()).expect("valid test config");
    (Arc::new(plane), clock)
}
