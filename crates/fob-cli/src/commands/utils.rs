//! Shared utilities for command implementations.

use crate::cli::ConfigArgs;
use crate::error::{BuildError, CliError, Result, ResultExt};
use fob_config::{ConfigDiscovery, RustBuildConfig};
use std::fs;
use std::path::{Path, PathBuf};

/// Resolve a path relative to a working directory.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Get the current working directory.
pub fn get_cwd() -> Result<PathBuf> {
    std::env::current_dir().map_err(|e| {
        CliError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to get current directory: {}", e),
        ))
    })
}

/// Directory entries and output paths are resolved against.
///
/// `--cwd` wins; otherwise the directory holding an explicit `--config`
/// file; otherwise the current directory.
pub fn project_root(args: &ConfigArgs) -> Result<PathBuf> {
    let cwd = get_cwd()?;
    if let Some(dir) = &args.cwd {
        return Ok(resolve_path(dir, &cwd));
    }
    if let Some(file) = &args.config {
        let file = resolve_path(file, &cwd);
        if let Some(parent) = file.parent() {
            return Ok(parent.to_path_buf());
        }
    }
    Ok(cwd)
}

/// Load configuration for a command: discovery (or `--config`), then the
/// selected profile.
pub fn load_config(args: &ConfigArgs) -> Result<(PathBuf, RustBuildConfig)> {
    let root = project_root(args)?;
    let discovery = ConfigDiscovery::new(&root);

    let config = match &args.config {
        Some(file) => {
            let path = resolve_path(file, &get_cwd()?);
            if !path.is_file() {
                return Err(CliError::FileNotFound(path));
            }
            discovery.load_from(&path)?
        }
        None => discovery.load()?,
    };

    let config = config.materialize_profile(args.profile.as_deref())?;
    tracing::debug!(
        root = %root.display(),
        entries = config.entries.len(),
        profile = args.profile.as_deref().unwrap_or("<none>"),
        "configuration loaded"
    );
    Ok((root, config))
}

/// Ensure an output directory exists, creating it if necessary.
pub fn ensure_output_dir(out_dir: &Path) -> Result<()> {
    if out_dir.exists() && !out_dir.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "Output path exists but is not a directory: {}",
            out_dir.display()
        )));
    }

    fs::create_dir_all(out_dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => {
            CliError::Build(BuildError::OutputNotWritable(out_dir.to_path_buf()))
        }
        _ => CliError::Io(e),
    })
}

/// Remove a directory and everything below it. Missing directories are fine.
pub fn remove_dir(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_path(dir),
    }
}
