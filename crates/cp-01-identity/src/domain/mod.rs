//! Domain module for the identity subsystem.

pub mod store;

pub use store::IdentityStore;
