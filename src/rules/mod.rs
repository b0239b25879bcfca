//! Rule model subsystem.
//!
//! # Data Flow
//! ```text
//! resource payload (IngressResource / API call)
//!     → model.rs (validate, normalize, derive is_catch_all)
//!     → filter.rs (drop catch-all rules when the policy says so)
//!     → effective rule set handed to the compiler
//! ```
//!
//! # Design Decisions
//! - Malformed rules never exist as values; construction returns `RuleError`
//! - `is_catch_all` is computed, never stored
//! - The suppression policy is an argument, not global state

pub mod filter;
pub mod model;

pub use filter::filter;
pub use model::{BackendRef, PathRule, Rule, RuleError, RuleId, DEFAULT_SERVER};
