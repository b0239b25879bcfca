//! Live configuration holder.
//!
//! The reconciler is the only writer; every reader loads an `Arc` to an
//! immutable snapshot without locking. Snapshots are replaced, never
//! modified.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::compiler::{compile, content_hash, render, ConfigDocument};
use crate::rules::BackendRef;

/// An applied document with its generation marker.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub generation: u64,
    pub hash: String,
    pub document: ConfigDocument,
    #[serde(skip)]
    pub rendered: String,
}

impl Snapshot {
    /// Render and hash `document` under `generation`.
    pub fn new(generation: u64, document: ConfigDocument) -> Self {
        let rendered = render(&document);
        let hash = content_hash(&rendered);
        Self {
            generation,
            hash,
            document,
            rendered,
        }
    }
}

/// The currently applied configuration.
#[derive(Debug)]
pub struct LiveConfig {
    current: ArcSwap<Snapshot>,
}

impl LiveConfig {
    /// Start at generation 0 with only the default block.
    pub fn new(default_backend: &BackendRef) -> Self {
        let bootstrap = Snapshot::new(0, compile(&[], default_backend));
        Self {
            current: ArcSwap::from_pointee(bootstrap),
        }
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation
    }

    pub(crate) fn publish(&self, snapshot: Arc<Snapshot>) {
        self.current.store(snapshot);
    }
}
