//! One filesystem watcher shared by every unit of a session.
//!
//! Watched files are observed through their parent directory,
//! non-recursively; watched directories are observed recursively. Change
//! paths are forwarded unfiltered except for ignored directories, and routed
//! to units by the coordinator.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A filesystem change affecting one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }

    fn from_event(kind: &EventKind, path: &Path) -> Option<Self> {
        let path = path.to_path_buf();
        match kind {
            EventKind::Create(_) => Some(FileChange::Created(path)),
            EventKind::Modify(_) => Some(FileChange::Modified(path)),
            EventKind::Remove(_) => Some(FileChange::Removed(path)),
            _ => None,
        }
    }
}

/// Owns the platform watcher and the set of directories it observes.
pub struct WatchHub {
    watcher: RecommendedWatcher,
    watched: BTreeMap<PathBuf, RecursiveMode>,
}

impl std::fmt::Debug for WatchHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHub")
            .field("watched", &self.watched.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl WatchHub {
    /// Create a hub forwarding changes into `tx`. Changes below any of
    /// `ignored` are dropped.
    pub fn new(tx: mpsc::Sender<FileChange>, ignored: Vec<PathBuf>) -> notify::Result<Self> {
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    tracing::warn!(error = %err, "file watcher error");
                    return;
                }
            };
            for path in &event.paths {
                if is_ignored(path, &ignored) {
                    continue;
                }
                if let Some(change) = FileChange::from_event(&event.kind, path) {
                    // Runs on the watcher's own thread
                    if tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
        })?;

        Ok(Self {
            watcher,
            watched: BTreeMap::new(),
        })
    }

    /// Observe exactly what `paths` requires, adding and removing
    /// platform watches as needed.
    pub fn sync<'a>(&mut self, paths: impl IntoIterator<Item = &'a Path>) {
        let wanted = watch_targets(paths);

        let stale: Vec<PathBuf> = self
            .watched
            .iter()
            .filter(|(dir, mode)| wanted.get(dir.as_path()) != Some(*mode))
            .map(|(dir, _)| dir.clone())
            .collect();
        for dir in stale {
            if let Err(err) = self.watcher.unwatch(&dir) {
                tracing::debug!(dir = %dir.display(), error = %err, "unwatch failed");
            }
            self.watched.remove(&dir);
        }

        for (dir, mode) in wanted {
            if self.watched.contains_key(&dir) {
                continue;
            }
            match self.watcher.watch(&dir, mode) {
                Ok(()) => {
                    self.watched.insert(dir, mode);
                }
                Err(err) => {
                    tracing::warn!(dir = %dir.display(), error = %err, "cannot watch directory");
                }
            }
        }

        tracing::debug!(dirs = self.watched.len(), "watch set synced");
    }

    pub fn watched_dirs(&self) -> impl Iterator<Item = &Path> {
        self.watched.keys().map(PathBuf::as_path)
    }
}

/// Directories to watch, with their mode, for a set of watched paths.
fn watch_targets<'a>(paths: impl IntoIterator<Item = &'a Path>) -> BTreeMap<PathBuf, RecursiveMode> {
    let mut recursive = BTreeSet::new();
    let mut parents = BTreeSet::new();

    for path in paths {
        if path.is_dir() {
            recursive.insert(path.to_path_buf());
        } else if let Some(parent) = path.parent().filter(|p| p.is_dir()) {
            parents.insert(parent.to_path_buf());
        }
    }

    let mut targets: BTreeMap<PathBuf, RecursiveMode> = parents
        .into_iter()
        .filter(|dir| !recursive.iter().any(|r| dir.starts_with(r)))
        .map(|dir| (dir, RecursiveMode::NonRecursive))
        .collect();
    for dir in &recursive {
        if !recursive.iter().any(|r| r != dir && dir.starts_with(r)) {
            targets.insert(dir.clone(), RecursiveMode::Recursive);
        }
    }
    targets
}

fn is_ignored(path: &Path, ignored: &[PathBuf]) -> bool {
    ignored.iter().any(|dir| path.starts_with(dir))
        || path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.') || n.ends_with('~'))
}
