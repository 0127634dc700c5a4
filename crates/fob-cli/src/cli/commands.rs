use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::cli::enums::*;
use crate::cli::validation::{parse_global, parse_jobs};

/// Available fob subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile every configured crate
    ///
    /// Builds all entries from fob.toml concurrently, writes one loader module
    /// per crate to the output directory and prints a per-unit summary. Exits
    /// non-zero when any unit fails.
    Build(BuildArgs),

    /// Build, then rebuild units as their inputs change
    ///
    /// Runs an initial build and watches each crate's declared inputs. A burst
    /// of changes triggers a single rebuild of the affected unit only.
    Dev(DevArgs),

    /// Validate configuration and manifests
    ///
    /// Loads fob.toml (or the "fob" field of package.json), applies the
    /// selected profile and checks that every entry's manifest exists.
    Check(CheckArgs),

    /// Clear the artifact cache
    Clean(CleanArgs),
}

/// Where configuration comes from
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a config file (fob.toml or package.json)
    ///
    /// When omitted, fob.toml and then package.json are searched in the
    /// working directory.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Named profile merged over the base configuration
    #[arg(short, long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Project root (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,
}

/// Arguments for the build command
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output directory for loader modules, artifacts and maps
    #[arg(short = 'd', long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Module format of the loader glue
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<Format>,

    /// How the glue obtains artifact bytes
    #[arg(long, value_enum)]
    pub loader: Option<Loader>,

    /// Emit merged debug maps
    #[arg(long)]
    pub sourcemap: bool,

    /// Build without optimizations
    #[arg(long)]
    pub debug: bool,

    /// Maximum concurrent toolchain processes
    #[arg(short, long, value_parser = parse_jobs, value_name = "N")]
    pub jobs: Option<usize>,

    /// Skip the artifact cache
    #[arg(long)]
    pub no_cache: bool,

    /// Global variable name for IIFE output
    #[arg(long, value_parser = parse_global, value_name = "NAME")]
    pub global_name: Option<String>,

    /// Print the build report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the dev command
#[derive(Args, Debug, Default)]
pub struct DevArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Quiet period in milliseconds that coalesces bursts of changes
    #[arg(long, value_name = "MS")]
    pub debounce: Option<u64>,

    /// Build without optimizations
    #[arg(long)]
    pub debug: bool,
}

/// Arguments for the check command
#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Only validate the configuration's shape; skip filesystem checks
    #[arg(long)]
    pub schema_only: bool,
}

/// Arguments for the clean command
#[derive(Args, Debug, Default)]
pub struct CleanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Also remove the output directory
    #[arg(long)]
    pub outputs: bool,
}
