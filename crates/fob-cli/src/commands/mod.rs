//! Command implementations for the fob CLI.
//!
//! - [`build`] - Compile every configured crate once
//! - [`dev`] - Build, then rebuild units as their sources change
//! - [`check`] - Validate configuration without compiling
//! - [`clean`] - Drop cached artifacts
//!
//! Each command provides an `execute` function that takes the parsed command
//! arguments and returns a Result.

pub mod build;
pub mod check;
pub mod clean;
pub mod dev;
pub(crate) mod utils;

pub use build::execute as build_execute;
pub use check::execute as check_execute;
pub use clean::execute as clean_execute;
pub use dev::execute as dev_execute;
