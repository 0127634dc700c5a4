//! Error handling for the fob CLI.
//!
//! Commands return [`CliError`]. Library errors convert into it through
//! `#[from]` attributes, and [`ResultExt`] attaches paths and context
//! on the way up. `main` turns the final error into a `miette` report.
//!
//! # Example
//!
//! ```rust,no_run
//! use fob_cli::error::{Result, ResultExt};
//! use std::path::Path;
//!
//! fn read_manifest(path: &Path) -> Result<String> {
//!     std::fs::read_to_string(path)
//!         .with_path(path)
//!         .context("Failed to read manifest")
//! }
//! ```

mod miette;

pub use self::miette::cli_error_to_miette;

use std::path::PathBuf;
use thiserror::Error;

/// Top-level CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration could not be found, parsed or validated
    #[error("Configuration error: {0}")]
    Config(#[from] fob_config::ConfigError),

    /// The build finished but did not succeed
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Errors raised before or outside per-unit builds
    #[error("{0}")]
    Pipeline(#[from] fob_plugin_rust::Error),

    /// Invalid command-line arguments or options
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File or directory not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// I/O errors from file system operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with custom messages
    #[error("{0}")]
    Custom(String),
}

/// Build outcome errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// One or more units failed; their diagnostics were already printed
    #[error("{failed} of {total} units failed")]
    UnitsFailed {
        /// Units that did not reach success or cache hit
        failed: usize,
        /// Units in the build
        total: usize,
    },

    /// Output directory is not writable
    #[error("Output directory is not writable: {}\n\nHint: Check directory permissions or pass a different --out-dir", .0.display())]
    OutputNotWritable(PathBuf),

    /// Generic build error
    #[error("{0}")]
    Custom(String),
}

/// Result type alias using `CliError` as the default error type.
pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Extension trait for adding context to `Result` types.
pub trait ResultExt<T> {
    /// Turn a not-found I/O error into [`CliError::FileNotFound`] for `path`.
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T>;

    /// Prefix the error message.
    fn context(self, msg: impl std::fmt::Display) -> Result<T>;
}

impl<T, E: Into<CliError>> ResultExt<T> for std::result::Result<T, E> {
    fn with_path(self, path: impl AsRef<std::path::Path>) -> Result<T> {
        self.map_err(|e| match e.into() {
            CliError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound => {
                CliError::FileNotFound(path.as_ref().to_path_buf())
            }
            other => other,
        })
    }

    fn context(self, msg: impl std::fmt::Display) -> Result<T> {
        self.map_err(|e| {
            let err: CliError = e.into();
            CliError::Custom(format!("{}: {}", msg, err))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_failed_message() {
        let err = BuildError::UnitsFailed {
            failed: 1,
            total: 3,
        };
        assert_eq!(err.to_string(), "1 of 3 units failed");
    }

    #[test]
    fn test_cli_error_from_config_error() {
        let cli_err: CliError = fob_config::ConfigError::NoEntries.into();
        assert!(matches!(cli_err, CliError::Config(_)));
        assert_eq!(
            cli_err.to_string(),
            "Configuration error: no entries specified"
        );
    }

    #[test]
    fn test_cli_error_from_pipeline_error() {
        let err = fob_plugin_rust::Error::DuplicateUnitName {
            name: "engine".to_string(),
        };
        let cli_err: CliError = err.into();
        assert!(matches!(cli_err, CliError::Pipeline(_)));
        assert!(cli_err.to_string().contains("engine"));
    }

    #[test]
    fn test_result_ext_with_path() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));

        let err = result.with_path("/project/fob.toml").unwrap_err();
        assert!(matches!(err, CliError::FileNotFound(p) if p == PathBuf::from("/project/fob.toml")));
    }

    #[test]
    fn test_result_ext_with_path_keeps_other_io_errors() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));

        let err = result.with_path("/project/fob.toml").unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }

    #[test]
    fn test_result_ext_context() {
        let result: std::result::Result<(), BuildError> =
            Err(BuildError::Custom("boom".to_string()));

        let err = result.context("Failed to clean").unwrap_err();
        assert_eq!(err.to_string(), "Failed to clean: Build error: boom");
    }
}
