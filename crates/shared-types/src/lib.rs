//! # Shared Types Crate
//!
//! Domain primitives used across the control plane subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every cross-subsystem type is defined here.
//! - **Owned Stores**: Subsystems exchange values, never shared mutable handles.
//! - **Injectable Time**: All time-dependent logic reads a [`TimeSource`], so
//!   state machines stay deterministic under test.

pub mod entities;
pub mod errors;
pub mod time;

pub use entities::*;
pub use errors::*;
pub use time::{
    ManualTimeSource, SystemTimeSource, TimeSource, Timestamp, MILLIS_PER_DAY, MILLIS_PER_HOUR,
    MILLIS_PER_SECOND,
};
