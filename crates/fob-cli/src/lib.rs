//! fob CLI - compile Rust crates to WebAssembly modules for JavaScript
//! bundles.
//!
//! The command-line surface over `fob-config` and `fob-plugin-rust`:
//!
//! - [`cli`] - Argument definitions
//! - [`commands`] - `build`, `dev`, `check` and `clean`
//! - [`error`] - Error types with actionable messages
//! - [`logger`] - Structured logging with tracing
//! - [`ui`] - Spinner, status messages and build summaries
//!
//! # Example
//!
//! ```rust
//! use fob_cli::{error::Result, logger};
//!
//! fn main() -> Result<()> {
//!     logger::init_logger(false, false, false);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{BuildError, CliError, Result, ResultExt};
