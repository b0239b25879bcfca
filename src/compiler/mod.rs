//! Configuration compiler subsystem.
//!
//! # Data Flow
//! ```text
//! effective rule set + default backend
//!     → compile.rs (group by host, resolve conflicts, order locations)
//!     → document.rs (immutable ConfigDocument)
//!     → render.rs (nginx-style text + content hash)
//! ```
//!
//! # Design Decisions
//! - Deciding the document and rendering it are separate steps
//! - Both steps are pure; identical rule sets give byte-identical text
//! - Exactly one `"_"` block exists in every document

pub mod compile;
pub mod document;
pub mod render;

pub use compile::compile;
pub use document::{ConfigDocument, Location, ServerBlock, Upstream, DEFAULT_UPSTREAM};
pub use render::{content_hash, render};
