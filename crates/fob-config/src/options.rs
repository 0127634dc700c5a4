//! Option groups for a Rust-to-WebAssembly build.
//!
//! Every group deserializes with defaults so that a config file only needs to
//! mention what it changes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Module format of the emitted loader glue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// Immediately invoked function expression assigned to a global.
    Iife,
    /// ECMAScript module.
    #[default]
    Esm,
    /// CommonJS module.
    Cjs,
}

impl ModuleFormat {
    /// Stable lowercase name, used in fingerprints and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleFormat::Iife => "iife",
            ModuleFormat::Esm => "esm",
            ModuleFormat::Cjs => "cjs",
        }
    }
}

impl std::fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ModuleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iife" => Ok(ModuleFormat::Iife),
            "esm" | "es" | "module" => Ok(ModuleFormat::Esm),
            "cjs" | "commonjs" => Ok(ModuleFormat::Cjs),
            other => Err(format!("unknown module format: {other}")),
        }
    }
}

/// Where and how bundle outputs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Output directory for glue modules, artifacts and maps.
    pub dir: PathBuf,

    /// Module format of the emitted glue.
    pub format: ModuleFormat,

    /// Emit merged debug maps next to each glue module.
    pub sourcemap: bool,

    /// Global variable name for IIFE output. Defaults to the unit name.
    pub global_name: Option<String>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("dist/js"),
            format: ModuleFormat::Esm,
            sourcemap: false,
            global_name: None,
        }
    }
}

/// How the external compiler is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainOptions {
    /// Program used to drive compilation.
    pub cargo: PathBuf,

    /// Target triple passed to the toolchain.
    pub target: String,

    /// Build with optimizations (`--release`).
    pub release: bool,

    /// Extra arguments appended after the fixed argument shape.
    pub cargo_args: Vec<String>,

    /// Explicit `RUSTFLAGS` for the child process.
    pub rustflags: Option<String>,

    /// Hard wall-clock limit per invocation, in seconds.
    pub timeout_secs: u64,

    /// Public location the emitted artifacts are served from.
    ///
    /// When present, loader glue fetches `<server_path><file>` instead of
    /// resolving the artifact relative to the module that loads it.
    pub server_path: Option<String>,

    /// Root directory for toolchain output. Defaults to `target/fob-rust`.
    pub target_dir: Option<PathBuf>,

    /// Pinned environment passed to the child process.
    pub env: BTreeMap<String, String>,
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            cargo: PathBuf::from("cargo"),
            target: "wasm32-unknown-unknown".to_string(),
            release: true,
            cargo_args: Vec::new(),
            rustflags: None,
            timeout_secs: 600,
            server_path: None,
            target_dir: None,
            env: BTreeMap::new(),
        }
    }
}

/// How loader glue obtains artifact bytes at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderMode {
    /// Fetch the artifact over the network.
    #[default]
    Fetch,
    /// Embed the artifact into the module as base64.
    Inline,
    /// Read the artifact from disk with Node's `fs`.
    Node,
}

impl LoaderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderMode::Fetch => "fetch",
            LoaderMode::Inline => "inline",
            LoaderMode::Node => "node",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    pub mode: LoaderMode,
}

/// Artifact cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheOptions {
    /// Skip the cache entirely when false.
    pub enabled: bool,

    /// Cache directory. Defaults to `<target_dir>/cache`.
    pub dir: Option<PathBuf>,

    /// Byte budget for cached artifacts and debug maps.
    pub max_bytes: u64,

    /// Keep entries on disk so they survive restarts.
    pub persist: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            max_bytes: 256 * 1024 * 1024,
            persist: true,
        }
    }
}

/// Whether entries share one pool of toolchain slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolPolicy {
    /// One pool bounded by `jobs` for all entries.
    #[default]
    Shared,
    /// Each entry gets its own pool of `jobs` slots.
    PerEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyOptions {
    /// Maximum concurrent toolchain processes. Defaults to available parallelism.
    pub jobs: Option<usize>,

    pub pool: PoolPolicy,
}

impl ConcurrencyOptions {
    /// Effective slot count.
    pub fn effective_jobs(&self) -> usize {
        self.jobs
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Watch mode settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevOptions {
    /// Quiet period that coalesces bursts of change events.
    pub debounce_ms: u64,

    /// Extra paths watched for every unit, relative to the project root.
    pub watch_patterns: Vec<PathBuf>,
}

impl Default for DevOptions {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            watch_patterns: Vec::new(),
        }
    }
}
