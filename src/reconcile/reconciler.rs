//! Reconciliation loop.
//!
//! # State Transitions
//! ```text
//! Idle → Recomputing: watch event (burst coalesced), periodic relist, retry due
//! Recomputing → Idle: compiled hash equals the live hash (no reload)
//! Recomputing → Applying: compiled hash differs
//! Applying → Idle: target acknowledged, snapshot published
//! Applying → Idle: target failed or timed out, retry scheduled with backoff
//! ```
//!
//! # Design Decisions
//! - Single task; the only writer of the rule store and the live snapshot
//! - Subscribe before listing, so nothing between list and watch is lost
//! - A closed watch channel always triggers a full relist
//! - A snapshot is published only after its apply succeeded

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::compiler::compile;
use crate::config::ControllerConfig;
use crate::observability::metrics;
use crate::reconcile::live::{LiveConfig, Snapshot};
use crate::reconcile::target::{ApplyError, ApplyTarget};
use crate::resilience::Backoff;
use crate::rules::{filter, Rule, RuleId};
use crate::source::{RuleSource, SourceError, WatchEvent};

/// Observable phase of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Recomputing,
    Applying,
}

/// Result of one recompute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new document was applied under this generation.
    Applied(u64),
    /// The compiled document matched the live one.
    Unchanged,
}

pub struct Reconciler {
    source: Arc<dyn RuleSource>,
    target: Arc<dyn ApplyTarget>,
    live: Arc<LiveConfig>,
    config: ControllerConfig,
    backoff: Backoff,
    rules: BTreeMap<RuleId, Rule>,
    state: watch::Sender<LoopState>,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn RuleSource>,
        target: Arc<dyn ApplyTarget>,
        live: Arc<LiveConfig>,
        config: ControllerConfig,
    ) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            source,
            target,
            live,
            backoff: Backoff::from(&config),
            config,
            rules: BTreeMap::new(),
            state,
        }
    }

    /// Subscribe to loop state changes.
    pub fn state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Run until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut events: Option<mpsc::Receiver<WatchEvent>> = None;
        let mut dirty = false;
        let mut resync_attempt = 0u32;
        let mut apply_attempt = 0u32;
        let mut retry_at: Option<Instant> = None;

        let period = self.config.resync_interval();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            suppress_catch_all = self.config.suppress_catch_all,
            default_backend = %self.config.default_backend,
            resync_interval = ?period,
            "Reconciler starting"
        );

        loop {
            if events.is_none() {
                match self.resync().await {
                    Ok(rx) => {
                        events = Some(rx);
                        resync_attempt = 0;
                        dirty = true;
                    }
                    Err(e) => {
                        resync_attempt += 1;
                        let delay = self.backoff.delay(resync_attempt);
                        tracing::warn!(
                            error = %e,
                            attempt = resync_attempt,
                            delay = ?delay,
                            "Resync failed, retrying"
                        );
                        tokio::select! {
                            _ = time::sleep(delay) => continue,
                            _ = shutdown.recv() => break,
                        }
                    }
                }
            }

            let due = retry_at.map_or(true, |at| Instant::now() >= at);
            if dirty && due {
                tokio::select! {
                    outcome = self.reconcile_once() => match outcome {
                        Ok(_) => {
                            dirty = false;
                            apply_attempt = 0;
                            retry_at = None;
                        }
                        Err(e) => {
                            apply_attempt += 1;
                            let delay = self.backoff.delay(apply_attempt);
                            tracing::error!(
                                error = %e,
                                attempt = apply_attempt,
                                delay = ?delay,
                                "Apply failed, keeping previous configuration"
                            );
                            retry_at = Some(Instant::now() + delay);
                        }
                    },
                    _ = shutdown.recv() => {
                        tracing::info!("Shutdown during reconcile, abandoning cycle");
                        break;
                    }
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                event = next_event(&mut events) => match event {
                    Some(event) => {
                        let mut restart = self.fold(event);
                        // Coalesce whatever else is already queued.
                        if let Some(rx) = events.as_mut() {
                            while let Ok(event) = rx.try_recv() {
                                restart |= self.fold(event);
                            }
                        }
                        if restart {
                            metrics::record_resync("restart");
                            events = None;
                        }
                        dirty = true;
                    }
                    None => {
                        tracing::warn!("Rule watch disconnected, resynchronizing");
                        metrics::record_resync("disconnect");
                        events = None;
                    }
                },
                _ = ticker.tick() => {
                    metrics::record_resync("periodic");
                    match self.source.list().await {
                        Ok(rules) => {
                            self.replace_rules(rules);
                            dirty = true;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Periodic relist failed");
                            events = None;
                        }
                    }
                },
                _ = time::sleep_until(retry_at.unwrap_or_else(Instant::now)), if dirty && retry_at.is_some() => {}
            }
        }

        self.set_state(LoopState::Idle);
        tracing::info!("Reconciler stopped");
    }

    /// Subscribe, then rebuild the rule store from a full listing.
    async fn resync(&mut self) -> Result<mpsc::Receiver<WatchEvent>, SourceError> {
        let rx = self.source.watch().await?;
        let rules = self.source.list().await?;
        self.replace_rules(rules);
        tracing::info!(rules = self.rules.len(), "Rule store resynchronized");
        Ok(rx)
    }

    fn replace_rules(&mut self, rules: Vec<Rule>) {
        self.rules = rules
            .into_iter()
            .map(|rule| (rule.id().clone(), rule))
            .collect();
    }

    /// Fold one event into the rule store. Returns true if a relist is needed.
    fn fold(&mut self, event: WatchEvent) -> bool {
        match event {
            WatchEvent::Applied(rule) => {
                tracing::debug!(
                    rule = %rule.id(),
                    host = rule.host_name(),
                    catch_all = rule.is_catch_all(),
                    "Rule applied"
                );
                self.rules.insert(rule.id().clone(), rule);
                false
            }
            WatchEvent::Deleted(id) => {
                tracing::debug!(rule = %id, "Rule deleted");
                self.rules.remove(&id);
                false
            }
            WatchEvent::Invalid { origin, error } => {
                tracing::warn!(origin = %origin, error = %error, "Ignoring malformed rule");
                false
            }
            WatchEvent::Restart => true,
        }
    }

    /// Filter, compile, and apply the current rule set once.
    pub async fn reconcile_once(&mut self) -> Result<CycleOutcome, ApplyError> {
        let start = std::time::Instant::now();
        self.set_state(LoopState::Recomputing);

        let rules: Vec<Rule> = self.rules.values().cloned().collect();
        let effective = filter(rules, self.config.suppress_catch_all);
        let document = compile(&effective, &self.config.default_backend);

        let current = self.live.current();
        let snapshot = Snapshot::new(current.generation + 1, document);
        if snapshot.hash == current.hash {
            self.set_state(LoopState::Idle);
            metrics::record_reconcile("unchanged", start);
            tracing::debug!(generation = current.generation, "Configuration unchanged, skipping reload");
            return Ok(CycleOutcome::Unchanged);
        }

        self.set_state(LoopState::Applying);
        let timeout = self.config.apply_timeout();
        let result = time::timeout(timeout, self.target.apply(&snapshot)).await;
        self.set_state(LoopState::Idle);

        match result {
            Ok(Ok(())) => {
                let generation = snapshot.generation;
                tracing::info!(
                    generation,
                    hash = %snapshot.hash,
                    servers = snapshot.document.servers().count(),
                    rules = self.rules.len(),
                    effective = effective.len(),
                    "Configuration applied"
                );
                self.live.publish(Arc::new(snapshot));
                metrics::set_generation(generation);
                metrics::record_reconcile("applied", start);
                Ok(CycleOutcome::Applied(generation))
            }
            Ok(Err(e)) => {
                metrics::record_apply_failure();
                metrics::record_reconcile("failed", start);
                Err(e)
            }
            Err(_) => {
                metrics::record_apply_failure();
                metrics::record_reconcile("failed", start);
                Err(ApplyError::TimedOut(timeout))
            }
        }
    }

    fn set_state(&self, state: LoopState) {
        self.state.send_replace(state);
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<WatchEvent>>) -> Option<WatchEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
