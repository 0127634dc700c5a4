//! Error types for the Rust-to-WebAssembly pipeline.
//!
//! Two layers of failure exist:
//!
//! - [`Error`] is returned from operations that are fatal to the call that
//!   produced them (resolving manifests, reading the cache directory, ...).
//! - [`FailureKind`] classifies per-unit failures. These never short-circuit a
//!   multi-unit build; they are attached to the unit's report instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::CacheError;

/// Result type alias for fob-plugin-rust operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the orchestration engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A configured entry points at a manifest that is missing or unreadable.
    #[error("invalid manifest for entry '{entry}' ({}): {reason}", .path.display())]
    InvalidManifest {
        entry: String,
        path: PathBuf,
        reason: String,
    },

    /// Two configured entries resolve to the same unit name.
    #[error("duplicate compilation unit name '{name}'")]
    DuplicateUnitName { name: String },

    /// The artifact's debug map could not be parsed.
    #[error("malformed debug map: {0}")]
    MalformedDebugMap(String),

    /// The artifact bytes are not a valid module for the target environment.
    #[error("failed to instantiate unit '{unit}': {reason}")]
    InstantiationError { unit: String, reason: String },

    /// The build was cancelled before the operation completed.
    #[error("build cancelled")]
    Cancelled,

    /// Artifact cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] fob_config::ConfigError),

    /// I/O failure outside of a toolchain invocation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a failed unit in a [`BuildReport`](crate::BuildReport).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The toolchain exited non-zero or broke its artifact contract.
    ToolchainFailure,
    /// The toolchain exceeded its wall-clock budget and was killed.
    Timeout,
    /// The build was cancelled while the unit was in flight.
    Cancelled,
    /// The artifact could not be turned into a loadable module.
    Instantiation,
    /// The debug map was malformed; the unit was emitted without a merged map.
    DebugMap,
    /// Writing the unit's outputs failed.
    Emit,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureKind::ToolchainFailure => "toolchain failure",
            FailureKind::Timeout => "timeout",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Instantiation => "instantiation error",
            FailureKind::DebugMap => "malformed debug map",
            FailureKind::Emit => "emit error",
        };
        f.write_str(name)
    }
}
