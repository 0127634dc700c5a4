#![cfg_attr(docsrs, feature(doc_cfg))]

//! # fob-plugin-rust
//!
//! Compiles Rust crates to WebAssembly with an out-of-process toolchain and
//! serves the artifacts as ordinary modules of a fob bundle.
//!
//! The pipeline for each configured entry:
//!
//! 1. [`resolver`] turns entries into [`CompilationUnit`]s.
//! 2. The [`cache`] is consulted with a content fingerprint of the crate.
//! 3. On a miss, the [`toolchain`] invoker runs the compiler under a timeout.
//! 4. The [`adapter`] validates the artifact and generates loader glue.
//! 5. The [`debugmap`] merger carries the artifact's debug map into the
//!    emitted output.
//!
//! The [`coordinator`] re-drives single units when their inputs change.
//!
//! ```no_run
//! use std::sync::Arc;
//! use fob_plugin_rust::{BuildContext, build_all};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = fob_config::discover(".")?;
//! let ctx = Arc::new(BuildContext::new(".", config)?);
//! let report = build_all(&ctx).await?;
//! for failure in report.failures() {
//!     eprintln!("{}: {}", failure.unit_name, failure.kind);
//! }
//! # Ok(()) }
//! ```

pub mod adapter;
pub mod cache;
pub mod context;
pub mod coordinator;
pub mod debugmap;
pub mod error;
pub mod pipeline;
pub mod resolver;
pub mod result;
pub mod toolchain;
pub mod unit;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

pub use adapter::{AdapterOptions, FobRustPlugin, ModuleDescriptor, ModuleRegistry};
pub use cache::{ArtifactCache, BuildFingerprint, CacheConfig, CachedArtifact};
pub use context::BuildContext;
pub use coordinator::{
    Coordinator, CoordinatorEvent, CoordinatorOptions, DependencyWatchSet, PipelineBuilder,
    UnitBuilder, UnitState,
};
pub use debugmap::{DebugMap, Embedding};
pub use error::{Error, FailureKind, Result};
pub use pipeline::{build_all, build_unit, build_units};
pub use result::{BuildReport, BuildResult, BuildStatus, UnitFailure, UnitReport, UnitWarning};
pub use toolchain::ToolchainInvoker;
pub use unit::{CompilationUnit, OptLevel, TargetProfile};

#[cfg(feature = "logging")]
pub use logging::{LogLevel, init_logging, init_logging_from_env};
