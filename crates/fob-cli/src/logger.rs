//! Logging infrastructure for the fob CLI.
//!
//! Libraries in this workspace only emit `tracing` events; the CLI installs
//! the subscriber that prints them.
//!
//! # Example
//!
//! ```rust,no_run
//! use fob_cli::logger::init_logger;
//! use tracing::info;
//!
//! init_logger(false, false, false);
//! info!("Starting build");
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE_FILTER: &str = "fob=debug,fob_cli=debug,fob_config=debug,fob_plugin_rust=debug";
const QUIET_FILTER: &str = "fob=error,fob_cli=error,fob_config=error,fob_plugin_rust=error";
const DEFAULT_FILTER: &str = "fob=info,fob_cli=info,fob_config=info,fob_plugin_rust=info";

/// Initialize the tracing subscriber with the specified options.
///
/// The logging level is determined in this order:
/// 1. `--verbose` flag: DEBUG for fob crates
/// 2. `--quiet` flag: ERROR only
/// 3. `RUST_LOG` environment variable: custom filter
/// 4. Default: INFO for fob crates
///
/// Must be called at most once per process.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    init_logger_with_filter(filter_for(verbose, quiet), no_color);
}

/// Initialize logger with a custom environment filter.
pub fn init_logger_with_filter(filter: EnvFilter, no_color: bool) {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .without_time()
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else if quiet {
        EnvFilter::new(QUIET_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Check if colored output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them; otherwise the
/// terminal's capabilities decide.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}
