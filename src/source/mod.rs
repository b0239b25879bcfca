//! Routing resource API.
//!
//! # Data Flow
//! ```text
//! resource store (memory / rule directory)
//!     → list()  : full snapshot, used at startup and on resync
//!     → watch() : stream of WatchEvent carrying full payloads
//!     → reconciler folds events into its rule store
//! ```
//!
//! # Design Decisions
//! - Delivery is at-least-once; a closed watch channel means "resync"
//! - Events carry the whole rule, never a diff
//! - A lagging watcher is disconnected rather than silently losing events

pub mod directory;
pub mod memory;
pub mod resource;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::rules::{Rule, RuleError, RuleId};

pub use directory::DirectorySource;
pub use memory::MemorySource;
pub use resource::IngressResource;

/// Capacity of each watch channel.
pub const WATCH_BUFFER: usize = 256;

/// A change notification from the resource API.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent {
    /// A rule was created or updated.
    Applied(Rule),
    /// A rule was deleted.
    Deleted(RuleId),
    /// A resource changed but does not form a valid rule.
    Invalid { origin: String, error: String },
    /// The source lost track of state; the consumer must relist.
    Restart,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid rule in {origin}: {source}")]
    Rule {
        origin: String,
        #[source]
        source: RuleError,
    },
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("rule {0} already exists")]
    AlreadyExists(RuleId),
    #[error("rule {0} not found")]
    NotFound(RuleId),
}

/// Consumed interface of the routing resource store.
#[async_trait]
pub trait RuleSource: Send + Sync + 'static {
    /// List every currently valid rule.
    async fn list(&self) -> Result<Vec<Rule>, SourceError>;

    /// Subscribe to change notifications.
    ///
    /// The channel closing means events may have been missed.
    async fn watch(&self) -> Result<mpsc::Receiver<WatchEvent>, SourceError>;
}
