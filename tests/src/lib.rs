//! # Sentinel Control Plane Test Suite
//!
//! Unified test crate for behaviour that spans subsystems.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── scenarios.rs     # End-to-end acceptance scenarios
//!     └── concurrency.rs   # Invariants under parallel load
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p cp-tests
//!
//! # By category
//! cargo test -p cp-tests integration::scenarios::
//! cargo test -p cp-tests integration::concurrency::
//! ```

#![allow(dead_code)]

pub mod integration;
