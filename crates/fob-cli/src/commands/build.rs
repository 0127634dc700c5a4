//! Build command implementation.
//!
//! `fob build` compiles every configured crate to WebAssembly and writes one
//! loader module per crate.

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::{BuildError, Result};
use crate::ui;
use fob_config::RustBuildConfig;
use fob_plugin_rust::{BuildContext, BuildReport};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Execute the build command.
///
/// # Build Process
///
/// 1. Load configuration (file, `FOB_` environment, profile)
/// 2. Apply command-line overrides and validate
/// 3. Build all units concurrently; Ctrl+C cancels in-flight units
/// 4. Print the per-unit summary (or the JSON report with `--json`)
///
/// Any failed unit makes the command fail after every unit has finished.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let start_time = Instant::now();

    let (root, mut config) = utils::load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    fob_config::validate_fs(&config, &root)?;
    utils::ensure_output_dir(&config.out_dir(&root))?;

    let report = build(&root, config, !args.json).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !ui::is_quiet() {
        ui::print_build_summary(&report);
    }

    finish(&report)?;
    ui::success(&format!(
        "Build completed in {}",
        ui::format_duration(start_time.elapsed())
    ));
    Ok(())
}

/// Fold command-line flags into the loaded configuration.
pub fn apply_overrides(config: &mut RustBuildConfig, args: &BuildArgs) {
    if let Some(dir) = &args.out_dir {
        config.output.dir = dir.clone();
    }
    if let Some(format) = args.format {
        config.output.format = format.into();
    }
    if let Some(loader) = args.loader {
        config.loader.mode = loader.into();
    }
    if let Some(name) = &args.global_name {
        config.output.global_name = Some(name.clone());
    }
    if let Some(jobs) = args.jobs {
        config.concurrency.jobs = Some(jobs);
    }
    config.output.sourcemap |= args.sourcemap;
    if args.debug {
        config.toolchain.release = false;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
}

/// Build every unit under a fresh context, cancelling on Ctrl+C.
pub(crate) async fn build(
    root: &Path,
    config: RustBuildConfig,
    show_progress: bool,
) -> Result<BuildReport> {
    let units = config.entries.len();
    let ctx = Arc::new(BuildContext::new(root, config)?);

    let spinner = if show_progress {
        ui::Spinner::new(&format!(
            "Compiling {} unit{}...",
            units,
            if units == 1 { "" } else { "s" }
        ))
    } else {
        ui::Spinner::hidden()
    };

    let interrupt = tokio::spawn({
        let ctx = Arc::clone(&ctx);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ui::warning("Interrupted, cancelling in-flight units");
                ctx.cancel();
            }
        }
    });

    let result = fob_plugin_rust::build_all(&ctx).await;
    interrupt.abort();

    match &result {
        Ok(report) if report.is_success() => spinner.clear(),
        Ok(report) => spinner.fail(&ui::summary_line(report)),
        Err(_) => spinner.fail("Build aborted"),
    }

    result.map_err(Into::into)
}

/// Turn a finished report into the command's outcome.
pub(crate) fn finish(report: &BuildReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    Err(BuildError::UnitsFailed {
        failed: report.failures().count(),
        total: report.units.len(),
    }
    .into())
}
