//! # cp-01-identity
//!
//! Issues and tracks scoped identities bound to a primary credential.
//!
//! ## Overview
//!
//! - **Idempotent issuance**: issuing for a credential that already has a
//!   non-expired identity returns that identity unchanged.
//! - **Fixed lifetime**: every identity expires a configured interval after
//!   issuance (24h by default).
//! - **Active view**: `lookup` only ever returns a non-expired identity.
//!
//! ```text
//! issue(credential, region)
//!     │
//!     ├── malformed ─────────────→ InvalidCredential
//!     ├── current identity live ─→ existing Identity (issued = false)
//!     └── none / expired ────────→ new Identity { tier: basic } (issued = true)
//! ```
//!
//! ## Concurrency
//!
//! Identities live in sharded maps; issuance for one credential holds only
//! that credential's shard entry, so unrelated credentials never contend.

pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use domain::store::IdentityStore;
pub use error::{IdentityError, IdentityResult};
pub use ports::inbound::{IdentityApi, IssueOutcome};
pub use service::{IdentityConfig, IdentityIssuer};
