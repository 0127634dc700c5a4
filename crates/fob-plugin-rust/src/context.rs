//! The orchestration context shared by every component of one build session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use fob_config::{PoolPolicy, RustBuildConfig};
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::adapter::{AdapterOptions, ModuleRegistry};
use crate::cache::{ArtifactCache, CacheConfig};
use crate::error::{Error, Result};
use crate::toolchain::ToolchainInvoker;

/// Toolchain version recorded when `--version` cannot be queried.
const UNKNOWN_VERSION: &str = "unknown";

/// Bounds concurrent toolchain processes.
#[derive(Debug)]
enum SlotPool {
    Shared(Arc<Semaphore>),
    PerEntry {
        jobs: usize,
        pools: DashMap<String, Arc<Semaphore>>,
    },
}

impl SlotPool {
    fn new(policy: PoolPolicy, jobs: usize) -> Self {
        match policy {
            PoolPolicy::Shared => SlotPool::Shared(Arc::new(Semaphore::new(jobs))),
            PoolPolicy::PerEntry => SlotPool::PerEntry {
                jobs,
                pools: DashMap::new(),
            },
        }
    }

    fn semaphore(&self, unit: &str) -> Arc<Semaphore> {
        match self {
            SlotPool::Shared(sem) => Arc::clone(sem),
            SlotPool::PerEntry { jobs, pools } => Arc::clone(
                pools
                    .entry(unit.to_string())
                    .or_insert_with(|| Arc::new(Semaphore::new(*jobs)))
                    .value(),
            ),
        }
    }
}

/// Everything a build needs, constructed once per invocation and passed by
/// reference.
#[derive(Debug)]
pub struct BuildContext {
    root: PathBuf,
    config: Arc<RustBuildConfig>,
    cache: Option<Arc<ArtifactCache>>,
    registry: Arc<ModuleRegistry>,
    pool: SlotPool,
    cancel: CancellationToken,
    invoker: ToolchainInvoker,
    adapter: AdapterOptions,
    toolchain_version: OnceCell<String>,
    /// Inputs each unit's most recent build reported, by unit name.
    declared_inputs: DashMap<String, Vec<PathBuf>>,
}

impl BuildContext {
    /// Create a context, opening the artifact cache when enabled.
    pub fn new(root: impl Into<PathBuf>, config: RustBuildConfig) -> Result<Self> {
        let root = root.into();
        let cache = if config.cache.enabled {
            let cache_config = CacheConfig::from_options(&config.cache, config.cache_dir(&root));
            Some(Arc::new(ArtifactCache::open(cache_config)?))
        } else {
            None
        };
        Ok(Self::with_cache(root, config, cache))
    }

    /// Create a context around an existing cache (or none).
    pub fn with_cache(
        root: impl Into<PathBuf>,
        config: RustBuildConfig,
        cache: Option<Arc<ArtifactCache>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let pool = SlotPool::new(config.concurrency.pool, config.concurrency.effective_jobs());
        let invoker = ToolchainInvoker::new(config.toolchain.clone(), cancel.clone());
        let adapter = AdapterOptions::from_config(&config);

        Self {
            root: root.into(),
            config: Arc::new(config),
            cache,
            registry: Arc::new(ModuleRegistry::new()),
            pool,
            cancel,
            invoker,
            adapter,
            toolchain_version: OnceCell::new(),
            declared_inputs: DashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Arc<RustBuildConfig> {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ArtifactCache>> {
        self.cache.as_ref()
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn invoker(&self) -> &ToolchainInvoker {
        &self.invoker
    }

    pub fn adapter_options(&self) -> &AdapterOptions {
        &self.adapter
    }

    pub fn target_dir(&self) -> PathBuf {
        self.config.target_dir(&self.root)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.config.out_dir(&self.root)
    }

    /// Directories never hashed as part of a crate's source tree.
    pub fn fingerprint_excludes(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.target_dir(), self.out_dir()];
        if self.config.cache.enabled {
            dirs.push(self.config.cache_dir(&self.root));
        }
        dirs
    }

    /// Inputs reported by the latest build of `unit` in this session.
    pub fn last_declared_inputs(&self, unit: &str) -> Option<Vec<PathBuf>> {
        self.declared_inputs.get(unit).map(|inputs| inputs.clone())
    }

    pub fn record_declared_inputs(&self, unit: &str, inputs: &[PathBuf]) {
        self.declared_inputs.insert(unit.to_string(), inputs.to_vec());
    }

    /// Token observed by every in-flight toolchain process.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the build. In-flight toolchain processes are killed.
    pub fn cancel(&self) {
        tracing::info!("cancelling build");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Toolchain version, queried once per context.
    pub async fn toolchain_version(&self) -> &str {
        self.toolchain_version
            .get_or_init(|| async {
                self.invoker
                    .version()
                    .await
                    .unwrap_or_else(|| UNKNOWN_VERSION.to_string())
            })
            .await
    }

    /// Wait for a toolchain slot for `unit`. Fails with [`Error::Cancelled`]
    /// when the build is cancelled first.
    pub async fn acquire_slot(&self, unit: &str) -> Result<OwnedSemaphorePermit> {
        let semaphore = self.pool.semaphore(unit);
        tokio::select! {
            permit = semaphore.acquire_owned() => permit.map_err(|_| Error::Cancelled),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}
