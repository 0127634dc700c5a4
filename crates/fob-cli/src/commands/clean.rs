//! Clean command implementation.

use crate::cli::CleanArgs;
use crate::commands::utils;
use crate::error::{Result, ResultExt};
use crate::ui;
use fob_plugin_rust::{ArtifactCache, CacheConfig};

/// Execute the clean command.
///
/// Removes every cached artifact. With `--outputs` the output directory is
/// removed as well. Toolchain target directories are left alone so the next
/// build stays incremental.
pub async fn execute(args: CleanArgs) -> Result<()> {
    let (root, config) = utils::load_config(&args.config)?;

    let cache_dir = config.cache_dir(&root);
    if cache_dir.is_dir() {
        let cache = ArtifactCache::open(
            CacheConfig::new(config.cache.max_bytes).with_persist_dir(cache_dir.clone()),
        )
        .map_err(fob_plugin_rust::Error::from)
        .context("Failed to open the artifact cache")?;
        let (entries, bytes) = (cache.len(), cache.total_bytes());
        cache
            .clear()
            .map_err(fob_plugin_rust::Error::from)
            .context("Failed to clear the artifact cache")?;
        tracing::debug!(dir = %cache_dir.display(), entries, bytes, "cache cleared");
        ui::success(&format!(
            "Removed {} cached artifact{} ({})",
            entries,
            if entries == 1 { "" } else { "s" },
            ui::format_size(bytes)
        ));
    } else {
        ui::info("Cache is already empty");
    }

    if args.outputs {
        let out_dir = config.out_dir(&root);
        if utils::remove_dir(&out_dir)? {
            ui::success(&format!("Removed {}", out_dir.display()));
        }
    }

    Ok(())
}
