//! Command-line interface definition for fob.
//!
//! Parsing uses clap v4's derive macros. Each subcommand has its own argument
//! struct; the options shared by every subcommand that loads configuration
//! live in [`ConfigArgs`].
//!
//! # Command Structure
//!
//! - `fob build` - Compile every configured crate and emit loader modules
//! - `fob dev` - Build, then rebuild units as their inputs change
//! - `fob check` - Validate configuration and manifests without building
//! - `fob clean` - Clear the artifact cache

mod commands;
pub mod enums;
mod tests;
mod validation;

use clap::Parser;

pub use commands::{BuildArgs, CheckArgs, CleanArgs, Command, ConfigArgs, DevArgs};
pub use enums::*;
pub use validation::{parse_global, parse_jobs};

/// Fob - Rust to WebAssembly builds for JavaScript bundles
#[derive(Parser, Debug)]
#[command(
    name = "fob",
    version,
    about = "Compile Rust crates to WebAssembly modules",
    long_about = "Fob compiles the Rust crates named in fob.toml to WebAssembly and emits\n\
                  a loader module for each one in ESM, CJS or IIFE format.\n\
                  Unchanged crates are served from a content-addressed artifact cache."
)]
pub struct Cli {
    /// Enable verbose logging (debug level)
    ///
    /// Shows cache decisions, toolchain argument vectors and per-unit timings.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}
