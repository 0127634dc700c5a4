//! Check command implementation.
//!
//! Validates configuration and crate manifests without invoking the
//! toolchain.

use crate::cli::CheckArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;
use fob_plugin_rust::resolver;

/// Execute the check command.
///
/// # Validation Steps
///
/// 1. Load configuration and apply the selected profile
/// 2. Validate option values (`--schema-only` stops here)
/// 3. Check that every entry points at a readable crate manifest
/// 4. Resolve entries into compilation units
pub async fn execute(args: CheckArgs) -> Result<()> {
    ui::info("Checking configuration...");

    let (root, config) = utils::load_config(&args.config)?;

    if args.schema_only {
        fob_config::validate_schema(&config)?;
        ui::success("Configuration is valid");
        return Ok(());
    }

    fob_config::validate_fs(&config, &root)?;
    ui::success("Configuration is valid");

    ui::info("Checking entries...");
    let units = resolver::resolve(&root, &config)?;
    for unit in &units {
        tracing::debug!(
            unit = %unit.name,
            manifest = %unit.manifest_path.display(),
            lib = %unit.lib_name,
            "entry resolved"
        );
        ui::success(&format!(
            "  {} ({})",
            unit.name,
            unit.manifest_path
                .strip_prefix(&root)
                .unwrap_or(&unit.manifest_path)
                .display()
        ));
    }

    ui::success(&format!(
        "{} entr{} ready to build",
        units.len(),
        if units.len() == 1 { "y" } else { "ies" }
    ));
    Ok(())
}
