//! Startup orchestration.
//!
//! # Responsibilities
//! - Pick the resource API and apply target from configuration
//! - Create the live configuration and spawn the reconciler
//!
//! # Design Decisions
//! - The controller is wired before listeners start, so the proxy always
//!   has a snapshot (generation 0) to serve from

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ControllerConfig;
use crate::lifecycle::Shutdown;
use crate::reconcile::{ApplyTarget, InProcess, LiveConfig, LoopState, Observer, Reconciler, RenderedFile};
use crate::source::{DirectorySource, MemorySource, RuleSource};

/// Handles to a running reconciler.
pub struct Controller {
    pub live: Arc<LiveConfig>,
    pub state: watch::Receiver<LoopState>,
    pub observer: Observer,
    pub task: JoinHandle<()>,
}

/// The resource API named by the configuration.
pub fn source_from_config(config: &ControllerConfig) -> Arc<dyn RuleSource> {
    match &config.rules_dir {
        Some(dir) => Arc::new(DirectorySource::new(dir)),
        None => {
            tracing::warn!("No rules_dir configured, serving the default backend only");
            Arc::new(MemorySource::new())
        }
    }
}

/// The apply target named by the configuration.
pub fn target_from_config(config: &ControllerConfig) -> Arc<dyn ApplyTarget> {
    match &config.render_path {
        Some(path) => Arc::new(RenderedFile::new(path)),
        None => Arc::new(InProcess),
    }
}

/// Create the live configuration and spawn the reconciler task.
pub fn spawn_controller(
    config: ControllerConfig,
    source: Arc<dyn RuleSource>,
    target: Arc<dyn ApplyTarget>,
    shutdown: &Shutdown,
) -> Controller {
    let live = Arc::new(LiveConfig::new(&config.default_backend));
    let observer = Observer::new(live.clone(), config.poll_interval());
    let reconciler = Reconciler::new(source, target, live.clone(), config);
    let state = reconciler.state();
    let task = tokio::spawn(reconciler.run(shutdown.subscribe()));

    Controller {
        live,
        state,
        observer,
        task,
    }
}
