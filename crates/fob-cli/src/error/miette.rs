//! Miette diagnostic conversion for CLI errors.

use crate::error::CliError;
use ::miette::Report;
use fob_config::ConfigError;
use fob_plugin_rust::Error as PipelineError;

/// Convert CliError to miette Report
pub fn cli_error_to_miette(err: CliError) -> Report {
    match help_for(&err) {
        Some(help) => ::miette::miette!(help = help, "{}", err),
        None => ::miette::miette!("{}", err),
    }
}

fn help_for(err: &CliError) -> Option<&'static str> {
    match err {
        CliError::Config(ConfigError::NotFound) => {
            Some("Create a fob.toml in the project root or pass --config <path>")
        }
        CliError::Config(ConfigError::NoEntries) => {
            Some("Add crates under [entries], e.g. engine = \"crates/engine\"")
        }
        CliError::Config(ConfigError::EntryNotFound { .. }) => {
            Some("Entries point at a crate directory or its Cargo.toml, relative to the project root")
        }
        CliError::Pipeline(PipelineError::InvalidManifest { .. }) => {
            Some("Check the manifest path for this entry under [entries]")
        }
        CliError::Pipeline(PipelineError::DuplicateUnitName { .. }) => {
            Some("Entry names must be unique, ignoring case")
        }
        CliError::Build(_) => Some("Run with --verbose to see toolchain invocations"),
        _ => None,
    }
}
