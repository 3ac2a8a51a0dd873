//! # cp-03-policy-engine
//!
//! Prioritized authorization policies evaluated against
//! `(identity, transaction, fraud score)`.
//!
//! ## Rule language
//!
//! Rules are boolean expressions compiled at registration time:
//!
//! ```text
//! classification == critical && amount > 100000
//! tier >= verified || (region == nairobi and not verified == false)
//! ```
//!
//! Fields: `amount`, `score` (integers), `classification`
//! (`low < medium < high < critical`), `tier` (`basic < verified < premium`),
//! `region` and `verified` (equality only). Anything that fails to lex,
//! parse or type-check is rejected with [`PolicyError::Parse`] and never
//! installed.
//!
//! ## Evaluation
//!
//! ```text
//! snapshot (priority desc, name asc)
//!     │
//!     ├── inactive / out of scope ──→ skip
//!     ├── predicate true ───────────→ Decision { outcome, matched_policy }
//!     └── exhausted ────────────────→ Decision { allow, "no policy matched" }
//! ```
//!
//! ## Hot reload
//!
//! The policy list lives behind `ArcSwap`. Mutations (`add`, `remove`,
//! `toggle`, `replace_all`, `load_toml`) build a fully compiled copy and
//! swap it in atomically; evaluations in flight keep the snapshot they
//! loaded.

pub mod domain;
pub mod error;
pub mod service;
pub mod store;

pub use domain::parser::parse_rule;
pub use domain::policy::{
    baseline_policies, Decision, Policy, PolicyDefinition, PolicyDocument, PolicyOutcome,
    PolicySummary,
};
pub use domain::predicate::{CmpOp, Comparison, Facts, Predicate};
pub use error::{PolicyError, PolicyResult};
pub use service::PolicyEngine;
pub use store::{PolicySet, PolicyStore};
