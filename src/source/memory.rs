//! In-process rule store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::rules::{Rule, RuleId};
use crate::source::{RuleSource, SourceError, WatchEvent, WATCH_BUFFER};

#[derive(Default)]
struct Inner {
    rules: BTreeMap<RuleId, Rule>,
    watchers: Vec<mpsc::Sender<WatchEvent>>,
}

/// A rule store kept in memory with create/update/delete semantics.
#[derive(Default)]
pub struct MemorySource {
    inner: Mutex<Inner>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a rule; fails if the identifier is taken.
    pub fn create(&self, rule: Rule) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if inner.rules.contains_key(rule.id()) {
            return Err(SourceError::AlreadyExists(rule.id().clone()));
        }
        inner.rules.insert(rule.id().clone(), rule.clone());
        inner.broadcast(WatchEvent::Applied(rule));
        Ok(())
    }

    /// Replace an existing rule.
    pub fn update(&self, rule: Rule) -> Result<(), SourceError> {
        let mut inner = self.lock();
        if !inner.rules.contains_key(rule.id()) {
            return Err(SourceError::NotFound(rule.id().clone()));
        }
        inner.rules.insert(rule.id().clone(), rule.clone());
        inner.broadcast(WatchEvent::Applied(rule));
        Ok(())
    }

    /// Create or replace a rule.
    pub fn apply(&self, rule: Rule) {
        let mut inner = self.lock();
        inner.rules.insert(rule.id().clone(), rule.clone());
        inner.broadcast(WatchEvent::Applied(rule));
    }

    pub fn delete(&self, id: &RuleId) -> Result<Rule, SourceError> {
        let mut inner = self.lock();
        let removed = inner
            .rules
            .remove(id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        inner.broadcast(WatchEvent::Deleted(id.clone()));
        Ok(removed)
    }

    pub fn get(&self, id: &RuleId) -> Option<Rule> {
        self.lock().rules.get(id).cloned()
    }

    /// Drop every open watch, as if the connection to the store broke.
    pub fn disconnect_watchers(&self) {
        let dropped = std::mem::take(&mut self.lock().watchers).len();
        tracing::info!(watchers = dropped, "Disconnected rule watchers");
    }

    pub fn watcher_count(&self) -> usize {
        let mut inner = self.lock();
        inner.watchers.retain(|tx| !tx.is_closed());
        inner.watchers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock still holds a consistent map; every mutation is a
        // single insert or remove.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Inner {
    fn broadcast(&mut self, event: WatchEvent) {
        self.watchers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("Rule watcher lagging, disconnecting it to force a resync");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }
}

#[async_trait]
impl RuleSource for MemorySource {
    async fn list(&self) -> Result<Vec<Rule>, SourceError> {
        Ok(self.lock().rules.values().cloned().collect())
    }

    async fn watch(&self) -> Result<mpsc::Receiver<WatchEvent>, SourceError> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        self.lock().watchers.push(tx);
        Ok(rx)
    }
}
