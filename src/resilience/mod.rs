//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Apply or resync attempt fails:
//!     → backoff.rs (next delay, exponential + jitter, capped)
//!     → reconciler sleeps, folding new events in meanwhile
//!     → retry from the latest rule set
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline; retries never stop the loop
//! - Jittered backoff prevents synchronized reload storms

pub mod backoff;

pub use backoff::Backoff;
