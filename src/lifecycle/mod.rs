//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Spawn reconciler → Start listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Reconciler stops between cycles → Listeners drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then controller, then listeners
//! - An abandoned apply never publishes, so shutdown leaves no partial document

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{spawn_controller, Controller};
