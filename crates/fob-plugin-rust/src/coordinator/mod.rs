//! Incremental rebuild coordinator.
//!
//! Each unit is driven by its own task, which exclusively owns the unit's
//! [`UnitState`]:
//!
//! ```text
//! Idle ──first success──▶ Watching ──change──▶ Stale ──debounce──▶ Rebuilding
//!                            ▲                                        │
//!                            └────────────────────────────────────────┘
//! ```
//!
//! Bursts of changes inside the debounce window collapse into one rebuild.
//! Changes arriving while a rebuild runs stay queued and start the next
//! cycle. A failed rebuild keeps serving the last good build.

mod watcher;

pub use watcher::{FileChange, WatchHub};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::context::BuildContext;
use crate::error::Result;
use crate::pipeline;
use crate::result::UnitReport;
use crate::unit::CompilationUnit;

/// Lifecycle of one unit during a development session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitState {
    /// No successful build yet.
    Idle,
    /// Serving a good build and waiting for changes.
    Watching,
    /// Inputs changed; waiting out the debounce window.
    Stale,
    Rebuilding,
}

/// Published after each state change that callers care about.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    RebuildStarted { unit: String, changes: usize },
    RebuildSucceeded { unit: String, report: Box<UnitReport> },
    RebuildFailed { unit: String, report: Box<UnitReport> },
}

impl CoordinatorEvent {
    pub fn unit(&self) -> &str {
        match self {
            CoordinatorEvent::RebuildStarted { unit, .. }
            | CoordinatorEvent::RebuildSucceeded { unit, .. }
            | CoordinatorEvent::RebuildFailed { unit, .. } => unit,
        }
    }
}

/// Rebuilds a single unit.
#[async_trait]
pub trait UnitBuilder: Send + Sync + 'static {
    async fn build(&self, unit: &CompilationUnit) -> UnitReport;
}

/// Rebuilds through the full pipeline of a [`BuildContext`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    ctx: Arc<BuildContext>,
}

impl PipelineBuilder {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl UnitBuilder for PipelineBuilder {
    async fn build(&self, unit: &CompilationUnit) -> UnitReport {
        pipeline::build_unit(&self.ctx, unit).await
    }
}

/// Paths watched per unit.
///
/// A change to a path, or to anything below a watched directory, makes the
/// unit stale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyWatchSet {
    units: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl DependencyWatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a unit's watched paths.
    pub fn set(&mut self, unit: &str, paths: BTreeSet<PathBuf>) {
        self.units.insert(unit.to_string(), paths);
    }

    pub fn get(&self, unit: &str) -> Option<&BTreeSet<PathBuf>> {
        self.units.get(unit)
    }

    pub fn remove(&mut self, unit: &str) -> Option<BTreeSet<PathBuf>> {
        self.units.remove(unit)
    }

    /// Units affected by a change to `path`.
    pub fn units_for(&self, path: &Path) -> Vec<&str> {
        self.units
            .iter()
            .filter(|(_, paths)| paths.iter().any(|watched| path.starts_with(watched)))
            .map(|(unit, _)| unit.as_str())
            .collect()
    }

    /// Every watched path across all units.
    pub fn all_paths(&self) -> BTreeSet<&Path> {
        self.units
            .values()
            .flatten()
            .map(PathBuf::as_path)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Paths to watch for a unit after a build.
///
/// The manifest is always watched. Inputs reported by the toolchain are used
/// when present; otherwise the whole `src` directory is.
pub fn watch_paths(unit: &CompilationUnit, report: &UnitReport, extra: &[PathBuf]) -> BTreeSet<PathBuf> {
    let mut paths = BTreeSet::new();
    paths.insert(unit.manifest_path.clone());
    if report.build.declared_inputs.is_empty() {
        paths.insert(unit.crate_dir.join("src"));
    } else {
        paths.extend(report.build.declared_inputs.iter().cloned());
    }
    paths.extend(extra.iter().cloned());
    paths
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub debounce: Duration,
    /// Watched for every unit in addition to its own inputs.
    pub extra_paths: Vec<PathBuf>,
    /// Changes below these directories are ignored.
    pub ignored: Vec<PathBuf>,
    /// Observe the filesystem. When false, changes arrive only through
    /// [`Coordinator::change_sender`].
    pub watch_filesystem: bool,
}

impl CoordinatorOptions {
    pub fn from_context(ctx: &BuildContext) -> Self {
        let dev = &ctx.config().dev;
        Self {
            debounce: Duration::from_millis(dev.debounce_ms),
            extra_paths: dev
                .watch_patterns
                .iter()
                .map(|p| if p.is_absolute() { p.clone() } else { ctx.root().join(p) })
                .collect(),
            ignored: ctx.fingerprint_excludes(),
            watch_filesystem: true,
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            extra_paths: Vec::new(),
            ignored: Vec::new(),
            watch_filesystem: false,
        }
    }
}

/// State shared between the router and unit tasks.
struct Shared<B> {
    builder: B,
    options: CoordinatorOptions,
    events: broadcast::Sender<CoordinatorEvent>,
    states: DashMap<String, UnitState>,
    last_good: DashMap<String, UnitReport>,
    watch_set: RwLock<DependencyWatchSet>,
    resync: mpsc::UnboundedSender<()>,
    shutdown: CancellationToken,
}

impl<B> Shared<B> {
    fn set_state(&self, unit: &str, state: UnitState) {
        tracing::debug!(unit, ?state, "unit state");
        self.states.insert(unit.to_string(), state);
    }

    fn publish(&self, event: CoordinatorEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Drives rebuilds for a set of units until shut down.
pub struct Coordinator<B: UnitBuilder> {
    shared: Arc<Shared<B>>,
    changes_tx: mpsc::Sender<FileChange>,
    changes_rx: mpsc::Receiver<FileChange>,
    resync_rx: mpsc::UnboundedReceiver<()>,
}

impl<B: UnitBuilder> Coordinator<B> {
    pub fn new(builder: B, options: CoordinatorOptions) -> Self {
        let (events, _) = broadcast::channel(64);
        let (changes_tx, changes_rx) = mpsc::channel(256);
        let (resync, resync_rx) = mpsc::unbounded_channel();

        Self {
            shared: Arc::new(Shared {
                builder,
                options,
                events,
                states: DashMap::new(),
                last_good: DashMap::new(),
                watch_set: RwLock::new(DependencyWatchSet::new()),
                resync,
                shutdown: CancellationToken::new(),
            }),
            changes_tx,
            changes_rx,
            resync_rx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.shared.events.subscribe()
    }

    /// Feed changes directly, bypassing the filesystem watcher.
    pub fn change_sender(&self) -> mpsc::Sender<FileChange> {
        self.changes_tx.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    pub fn handle(&self) -> CoordinatorHandle<B> {
        CoordinatorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// `initial` holds each unit with the report of its first build; the
    /// watch set is rebuilt wholesale from it.
    pub async fn run(self, initial: Vec<(CompilationUnit, UnitReport)>) -> Result<()> {
        let Coordinator {
            shared,
            changes_tx,
            mut changes_rx,
            mut resync_rx,
        } = self;

        let mut hub = if shared.options.watch_filesystem {
            Some(
                WatchHub::new(changes_tx, shared.options.ignored.clone())
                    .map_err(|e| std::io::Error::other(e.to_string()))?,
            )
        } else {
            drop(changes_tx);
            None
        };

        let mut routes: BTreeMap<String, mpsc::UnboundedSender<PathBuf>> = BTreeMap::new();
        let mut tasks = JoinSet::new();
        {
            let mut watch_set = shared.watch_set.write();
            *watch_set = DependencyWatchSet::new();
            for (unit, report) in initial {
                watch_set.set(
                    &unit.name,
                    watch_paths(&unit, &report, &shared.options.extra_paths),
                );

                let last_good = report.is_success().then_some(report);
                let state = if last_good.is_some() {
                    UnitState::Watching
                } else {
                    UnitState::Idle
                };
                shared.set_state(&unit.name, state);
                if let Some(report) = &last_good {
                    shared.last_good.insert(unit.name.clone(), report.clone());
                }

                let (tx, rx) = mpsc::unbounded_channel();
                routes.insert(unit.name.clone(), tx);
                tasks.spawn(unit_loop(Arc::clone(&shared), unit, rx));
            }
        }
        if let Some(hub) = hub.as_mut() {
            hub.sync(shared.watch_set.read().all_paths());
        }
        tracing::info!(units = routes.len(), "watching for changes");

        let mut changes_open = true;
        loop {
            tokio::select! {
                change = changes_rx.recv(), if changes_open => {
                    let Some(change) = change else {
                        changes_open = false;
                        continue;
                    };
                    let path = change.path();
                    let units: Vec<String> = shared
                        .watch_set
                        .read()
                        .units_for(path)
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                    for unit in units {
                        if let Some(route) = routes.get(&unit) {
                            tracing::trace!(unit, path = %path.display(), "change routed");
                            let _ = route.send(path.to_path_buf());
                        }
                    }
                }
                Some(()) = resync_rx.recv() => {
                    if let Some(hub) = hub.as_mut() {
                        hub.sync(shared.watch_set.read().all_paths());
                    }
                }
                _ = shared.shutdown.cancelled() => break,
            }
        }

        shared.shutdown.cancel();
        drop(routes);
        while tasks.join_next().await.is_some() {}
        tracing::info!("coordinator stopped");
        Ok(())
    }
}

/// Read access to a running coordinator.
pub struct CoordinatorHandle<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for CoordinatorHandle<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B> CoordinatorHandle<B> {
    pub fn state(&self, unit: &str) -> Option<UnitState> {
        self.shared.states.get(unit).map(|s| *s)
    }

    /// The build currently served for `unit`.
    pub fn last_good(&self, unit: &str) -> Option<UnitReport> {
        self.shared.last_good.get(unit).map(|r| r.clone())
    }

    pub fn watch_set(&self) -> DependencyWatchSet {
        self.shared.watch_set.read().clone()
    }

    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
    }
}

async fn unit_loop<B: UnitBuilder>(
    shared: Arc<Shared<B>>,
    unit: CompilationUnit,
    mut changes: mpsc::UnboundedReceiver<PathBuf>,
) {
    let name = unit.name.as_str();
    let debounce = shared.options.debounce;

    loop {
        tokio::select! {
            change = changes.recv() => {
                let Some(path) = change else { return };
                tracing::debug!(unit = name, path = %path.display(), "input changed");
            }
            _ = shared.shutdown.cancelled() => return,
        }
        shared.set_state(name, UnitState::Stale);

        let mut count = 1;
        loop {
            tokio::select! {
                change = changes.recv() => {
                    if change.is_none() {
                        return;
                    }
                    count += 1;
                }
                _ = tokio::time::sleep(debounce) => break,
                _ = shared.shutdown.cancelled() => return,
            }
        }

        shared.set_state(name, UnitState::Rebuilding);
        shared.publish(CoordinatorEvent::RebuildStarted {
            unit: name.to_string(),
            changes: count,
        });

        let report = tokio::select! {
            report = shared.builder.build(&unit) => report,
            _ = shared.shutdown.cancelled() => return,
        };

        if report.is_success() {
            let paths = watch_paths(&unit, &report, &shared.options.extra_paths);
            shared.watch_set.write().set(name, paths);
            let _ = shared.resync.send(());
            shared.last_good.insert(name.to_string(), report.clone());
            shared.set_state(name, UnitState::Watching);
            tracing::info!(unit = name, status = %report.build.status, "rebuilt");
            shared.publish(CoordinatorEvent::RebuildSucceeded {
                unit: name.to_string(),
                report: Box::new(report),
            });
        } else {
            let state = if shared.last_good.contains_key(name) {
                UnitState::Watching
            } else {
                UnitState::Idle
            };
            shared.set_state(name, state);
            tracing::warn!(
                unit = name,
                diagnostics = report.diagnostics().len(),
                "rebuild failed, keeping last good build"
            );
            shared.publish(CoordinatorEvent::RebuildFailed {
                unit: name.to_string(),
                report: Box::new(report),
            });
        }
    }
}
