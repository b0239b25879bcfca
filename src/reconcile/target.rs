//! Serving process reload targets.
//!
//! # Design Decisions
//! - `apply` must be idempotent; the reconciler may repeat it after a failure
//! - The reconciler enforces the apply timeout, targets need not

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::reconcile::live::Snapshot;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("serving process rejected configuration: {0}")]
    Rejected(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("apply timed out after {0:?}")]
    TimedOut(Duration),
}

/// Hands a compiled document to the serving process.
#[async_trait]
pub trait ApplyTarget: Send + Sync + 'static {
    async fn apply(&self, snapshot: &Snapshot) -> Result<(), ApplyError>;
}

#[async_trait]
impl<T: ApplyTarget + ?Sized> ApplyTarget for Arc<T> {
    async fn apply(&self, snapshot: &Snapshot) -> Result<(), ApplyError> {
        (**self).apply(snapshot).await
    }
}

/// The built-in proxy reads the live snapshot directly, so publishing is
/// the whole reload.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcess;

#[async_trait]
impl ApplyTarget for InProcess {
    async fn apply(&self, _snapshot: &Snapshot) -> Result<(), ApplyError> {
        Ok(())
    }
}

/// Writes the rendered document to a file for an external server.
///
/// The file is replaced with a rename so a reader never sees a partial
/// document.
#[derive(Debug, Clone)]
pub struct RenderedFile {
    path: PathBuf,
}

impl RenderedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ApplyTarget for RenderedFile {
    async fn apply(&self, snapshot: &Snapshot) -> Result<(), ApplyError> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, snapshot.rendered.as_bytes())
            .await
            .map_err(|source| ApplyError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| ApplyError::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            generation = snapshot.generation,
            "Rendered configuration written"
        );
        Ok(())
    }
}
