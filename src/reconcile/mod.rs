//! Reconciliation subsystem.
//!
//! # Data Flow
//! ```text
//! WatchEvent stream / periodic relist
//!     → reconciler.rs (fold into rule store, coalesce bursts)
//!     → rules::filter → compiler::compile → render + hash
//!     → target.rs (hand document to the serving process, bounded by timeout)
//!     → live.rs (atomic swap of Arc<Snapshot>)
//!     → observer.rs (callers poll until a predicate holds)
//! ```
//!
//! # Design Decisions
//! - One loop task writes; everyone else reads immutable snapshots
//! - No-op recomputations are detected by content hash, not generation
//! - Apply failures and watch drops are retried, never fatal

pub mod live;
pub mod observer;
pub mod reconciler;
pub mod target;

pub use live::{LiveConfig, Snapshot};
pub use observer::{Convergence, Observer};
pub use reconciler::{CycleOutcome, LoopState, Reconciler};
pub use target::{ApplyError, ApplyTarget, InProcess, RenderedFile};
