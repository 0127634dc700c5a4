//! Dev command implementation.
//!
//! Builds every unit once, then keeps each unit's outputs fresh as its
//! sources change. A failed rebuild leaves the previous outputs in place.

use crate::cli::DevArgs;
use crate::commands::utils;
use crate::error::{CliError, Result};
use crate::ui;
use fob_config::RustBuildConfig;
use fob_plugin_rust::coordinator::CoordinatorHandle;
use fob_plugin_rust::{
    BuildContext, Coordinator, CoordinatorEvent, CoordinatorOptions, PipelineBuilder, resolver,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;

/// Execute the dev command.
///
/// Runs until Ctrl+C. In-flight toolchain processes are cancelled on the way
/// out.
pub async fn execute(args: DevArgs) -> Result<()> {
    ui::info("Starting development session...");

    let (root, mut config) = utils::load_config(&args.config)?;
    apply_overrides(&mut config, &args);
    fob_config::validate_fs(&config, &root)?;
    utils::ensure_output_dir(&config.out_dir(&root))?;

    let ctx = Arc::new(BuildContext::new(&root, config)?);
    let units = resolver::resolve(&root, ctx.config())?;

    ui::info("Performing initial build...");
    let report = fob_plugin_rust::build_units(&ctx, units.clone()).await;
    ui::print_build_summary(&report);
    if !report.is_success() {
        ui::warning("Some units failed; they will be rebuilt when their sources change");
    }

    let options = CoordinatorOptions::from_context(&ctx);
    let debounce = options.debounce;
    let coordinator = Coordinator::new(PipelineBuilder::new(Arc::clone(&ctx)), options);
    let mut events = coordinator.subscribe();
    let handle = coordinator.handle();

    let initial = units.into_iter().zip(report.units).collect();
    let mut run = tokio::spawn(coordinator.run(initial));

    ui::info(&format!(
        "Watching for changes (debounce {})",
        ui::format_duration(debounce)
    ));
    ui::info("Press Ctrl+C to stop");

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => print_event(&event, &handle),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped coordinator events");
                }
                Err(RecvError::Closed) => break Ok(()),
            },
            _ = signal::ctrl_c() => {
                ui::info("Shutting down...");
                break Ok(());
            }
            finished = &mut run => {
                break match finished {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(CliError::from(e)),
                    Err(e) => Err(CliError::Custom(format!("coordinator task failed: {}", e))),
                };
            }
        }
    };

    handle.shutdown();
    ctx.cancel();
    if !run.is_finished() {
        if let Err(e) = run.await {
            tracing::debug!(error = %e, "coordinator task ended abnormally");
        }
    }

    outcome?;
    ui::success("Development session stopped");
    Ok(())
}

/// Fold command-line flags into the loaded configuration.
fn apply_overrides(config: &mut RustBuildConfig, args: &DevArgs) {
    if let Some(ms) = args.debounce {
        config.dev.debounce_ms = ms;
    }
    if args.debug {
        config.toolchain.release = false;
    }
}

fn print_event(event: &CoordinatorEvent, handle: &CoordinatorHandle<PipelineBuilder>) {
    match event {
        CoordinatorEvent::RebuildStarted { unit, changes } => {
            ui::info(&format!(
                "{} changed ({} file{}), rebuilding",
                unit,
                changes,
                if *changes == 1 { "" } else { "s" }
            ));
        }
        CoordinatorEvent::RebuildSucceeded { unit, report } => {
            ui::success(&format!(
                "Rebuilt {} in {}",
                unit,
                ui::format_duration(Duration::from_millis(report.build.duration_ms))
            ));
            for warning in &report.warnings {
                ui::warning(&warning.message);
            }
        }
        CoordinatorEvent::RebuildFailed { unit, report } => {
            let kind = report
                .failure
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "failed".to_string());
            ui::error(&format!("Rebuild of {} failed: {}", unit, kind));
            for line in report.diagnostics() {
                eprintln!("      {}", line);
            }
            if handle.last_good(unit).is_some() {
                ui::warning(&format!("Still serving the last good build of {}", unit));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = RustBuildConfig::default();
        let args = DevArgs {
            debounce: Some(250),
            debug: true,
            ..Default::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.dev.debounce_ms, 250);
        assert!(!config.toolchain.release);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let mut config = RustBuildConfig::default();
        let before = config.dev.debounce_ms;
        apply_overrides(&mut config, &DevArgs::default());
        assert_eq!(config.dev.debounce_ms, before);
        assert!(config.toolchain.release);
    }
}
