//! Ports for the identity subsystem.

pub mod inbound;
