//! Rule directory watcher.
//!
//! Every `*.toml` file in the directory is one routing resource. File
//! changes are picked up with `notify` and turned into watch events; the
//! file index lets a removed file be mapped back to its rule.
//!
//! A file that is edited into an invalid state keeps serving its last
//! valid rule, through events and relists alike. When several files
//! declare the same rule id, the lexically smallest path owns it and the
//! others are reported as invalid until the owner goes away.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::rules::{Rule, RuleId};
use crate::source::resource::IngressResource;
use crate::source::{RuleSource, SourceError, WatchEvent, WATCH_BUFFER};

/// What the directory last looked like.
#[derive(Debug, Default)]
struct FileIndex {
    /// Last valid rule loaded from each file.
    loaded: HashMap<PathBuf, Rule>,
    /// File that defines each rule id.
    owners: HashMap<RuleId, PathBuf>,
}

impl FileIndex {
    /// Record a valid load of `path`.
    fn claim(&mut self, path: &Path, rule: Rule) -> WatchEvent {
        let id = rule.id().clone();
        let previous = self.loaded.insert(path.to_path_buf(), rule.clone());
        if previous.is_some_and(|old| old.id() != &id) {
            // The file was edited to describe a different rule.
            return WatchEvent::Restart;
        }

        match self.owners.get(&id) {
            Some(owner) if owner.as_path() < path => WatchEvent::Invalid {
                origin: path.display().to_string(),
                error: format!(
                    "{}, defined in {}",
                    SourceError::AlreadyExists(id),
                    owner.display()
                ),
            },
            _ => {
                self.owners.insert(id, path.to_path_buf());
                WatchEvent::Applied(rule)
            }
        }
    }

    /// Forget a removed file. `None` when the live rule set is unaffected.
    fn release(&mut self, path: &Path) -> Option<WatchEvent> {
        // Never loaded, so its rule is unknown; let the consumer relist.
        let Some(rule) = self.loaded.remove(path) else {
            return Some(WatchEvent::Restart);
        };
        let id = rule.id();
        if self.owners.get(id).map(PathBuf::as_path) != Some(path) {
            return None;
        }

        self.owners.remove(id);
        let successor = self
            .loaded
            .iter()
            .filter(|(_, other)| other.id() == id)
            .min_by(|a, b| a.0.cmp(b.0))
            .map(|(path, rule)| (path.clone(), rule.clone()));
        match successor {
            Some((path, rule)) => {
                self.owners.insert(id.clone(), path);
                Some(WatchEvent::Applied(rule))
            }
            None => Some(WatchEvent::Deleted(id.clone())),
        }
    }

    /// Rules defined by their owning files, in path order.
    fn rules(&self) -> Vec<Rule> {
        let mut owned: Vec<(&PathBuf, &Rule)> = self
            .owners
            .values()
            .filter_map(|path| self.loaded.get_key_value(path))
            .collect();
        owned.sort_by(|a, b| a.0.cmp(b.0));
        owned.into_iter().map(|(_, rule)| rule.clone()).collect()
    }
}

type SharedIndex = Arc<Mutex<FileIndex>>;

/// A resource API backed by a directory of TOML rule files.
pub struct DirectorySource {
    dir: PathBuf,
    index: SharedIndex,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            index: Arc::default(),
        }
    }
}

/// Load one resource file into a rule.
pub fn load_rule(path: &Path) -> Result<Rule, SourceError> {
    let content = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resource: IngressResource = toml::from_str(&content).map_err(|source| SourceError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    resource.into_rule(stem).map_err(|source| SourceError::Rule {
        origin: path.display().to_string(),
        source,
    })
}

fn is_rule_file(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("toml"))
}

fn lock(index: &SharedIndex) -> std::sync::MutexGuard<'_, FileIndex> {
    index.lock().unwrap_or_else(|e| e.into_inner())
}

/// Translate a change to `path` into a watch event, if it has any effect.
fn event_for_path(path: &Path, index: &SharedIndex) -> Option<WatchEvent> {
    if !path.exists() {
        return lock(index).release(path);
    }

    match load_rule(path) {
        Ok(rule) => Some(lock(index).claim(path, rule)),
        Err(e) => Some(WatchEvent::Invalid {
            origin: path.display().to_string(),
            error: e.to_string(),
        }),
    }
}

/// Rebuild the index from the files in `dir`.
fn scan(dir: &Path, previous: &FileIndex) -> Result<FileIndex, SourceError> {
    let entries = std::fs::read_dir(dir).map_err(|source| SourceError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_rule_file(path))
        .collect();
    paths.sort();

    let mut fresh = FileIndex::default();
    for path in paths {
        let rule = match load_rule(&path) {
            Ok(rule) => rule,
            Err(e) => match previous.loaded.get(&path) {
                Some(last) => {
                    tracing::warn!(
                        error = %e,
                        rule = %last.id(),
                        "Invalid rule file, keeping last valid version"
                    );
                    last.clone()
                }
                None => {
                    tracing::warn!(error = %e, "Skipping invalid rule file");
                    continue;
                }
            },
        };

        match fresh.owners.entry(rule.id().clone()) {
            Entry::Occupied(owner) => tracing::warn!(
                rule = %rule.id(),
                path = %path.display(),
                owner = %owner.get().display(),
                "Duplicate rule id, ignoring file"
            ),
            Entry::Vacant(slot) => {
                slot.insert(path.clone());
            }
        }
        fresh.loaded.insert(path, rule);
    }
    Ok(fresh)
}

#[async_trait]
impl RuleSource for DirectorySource {
    async fn list(&self) -> Result<Vec<Rule>, SourceError> {
        let dir = self.dir.clone();
        let index = self.index.clone();

        let listed = tokio::task::spawn_blocking(move || -> Result<Vec<Rule>, SourceError> {
            let mut index = lock(&index);
            let fresh = scan(&dir, &index)?;
            *index = fresh;
            Ok(index.rules())
        })
        .await;

        match listed {
            Ok(result) => result,
            Err(e) => Err(SourceError::Io {
                path: self.dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            }),
        }
    }

    async fn watch(&self) -> Result<mpsc::Receiver<WatchEvent>, SourceError> {
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let index = self.index.clone();
        let callback_tx = tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let events: Vec<WatchEvent> = match res {
                    Ok(event) if event.kind.is_access() => Vec::new(),
                    Ok(event) => event
                        .paths
                        .iter()
                        .filter(|path| is_rule_file(path))
                        .filter_map(|path| event_for_path(path, &index))
                        .collect(),
                    Err(e) => {
                        tracing::error!("Rule watch error: {:?}", e);
                        vec![WatchEvent::Restart]
                    }
                };
                for event in events {
                    // Runs on the notify thread, outside the runtime.
                    if callback_tx.blocking_send(event).is_err() {
                        return;
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.dir, "Rule directory watcher started");

        // The watcher lives until the consumer drops its receiver.
        tokio::spawn(async move {
            let _watcher = watcher;
            tx.closed().await;
            tracing::debug!("Rule directory watcher stopped");
        });

        Ok(rx)
    }
}
