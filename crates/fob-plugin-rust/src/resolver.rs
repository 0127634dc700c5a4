//! Manifest resolution: configured entries to compilation units.

use std::path::{Path, PathBuf};

use fob_config::RustBuildConfig;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::unit::{CompilationUnit, OptLevel, TargetProfile};

/// The parts of `Cargo.toml` needed to name the artifact.
#[derive(Debug, Deserialize)]
struct ManifestDoc {
    package: Option<PackageSection>,
    lib: Option<LibSection>,
}

#[derive(Debug, Deserialize)]
struct PackageSection {
    name: String,
}

#[derive(Debug, Deserialize)]
struct LibSection {
    name: Option<String>,
    #[serde(rename = "crate-type")]
    crate_type: Option<Vec<String>>,
}

/// Resolve every configured entry, in declaration order.
///
/// Relative manifest paths are resolved against `root`. Nothing is spawned;
/// the only side effects are filesystem reads.
pub fn resolve(root: &Path, config: &RustBuildConfig) -> Result<Vec<CompilationUnit>> {
    resolve_entries(
        root,
        config
            .entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path())),
        config,
    )
}

/// Resolve an explicit sequence of `(entry name, manifest path)` pairs.
///
/// Fails with [`Error::DuplicateUnitName`] when two entries share a name,
/// compared case-insensitively since the name becomes an output file name.
pub fn resolve_entries<'a>(
    root: &Path,
    entries: impl IntoIterator<Item = (&'a str, &'a Path)>,
    config: &RustBuildConfig,
) -> Result<Vec<CompilationUnit>> {
    let mut units: Vec<CompilationUnit> = Vec::new();

    for (name, manifest) in entries {
        if units.iter().any(|u| u.name.eq_ignore_ascii_case(name)) {
            return Err(Error::DuplicateUnitName {
                name: name.to_string(),
            });
        }
        if !fob_config::is_valid_unit_name(name) {
            return Err(Error::InvalidManifest {
                entry: name.to_string(),
                path: manifest.to_path_buf(),
                reason: "entry name must be a valid identifier".to_string(),
            });
        }

        let unit = resolve_one(root, name, manifest, config)?;
        tracing::debug!(
            unit = %unit.name,
            manifest = %unit.manifest_path.display(),
            lib = %unit.lib_name,
            "resolved compilation unit"
        );
        units.push(unit);
    }

    Ok(units)
}

fn resolve_one(
    root: &Path,
    name: &str,
    manifest: &Path,
    config: &RustBuildConfig,
) -> Result<CompilationUnit> {
    let invalid = |path: PathBuf, reason: String| Error::InvalidManifest {
        entry: name.to_string(),
        path,
        reason,
    };

    let joined = if manifest.is_absolute() {
        manifest.to_path_buf()
    } else {
        root.join(manifest)
    };

    // A directory entry means its Cargo.toml
    let manifest_path = if joined.is_dir() {
        joined.join("Cargo.toml")
    } else {
        joined
    };

    if !manifest_path.is_file() {
        return Err(invalid(manifest_path, "file does not exist".to_string()));
    }

    let manifest_path = manifest_path
        .canonicalize()
        .map_err(|e| invalid(manifest_path.clone(), e.to_string()))?;

    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| invalid(manifest_path.clone(), format!("unreadable: {e}")))?;

    let doc: ManifestDoc = toml::from_str(&content)
        .map_err(|e| invalid(manifest_path.clone(), format!("invalid TOML: {e}")))?;

    let lib_name = lib_name(&doc).ok_or_else(|| {
        invalid(
            manifest_path.clone(),
            "manifest has no [package] or [lib] name".to_string(),
        )
    })?;

    if let Some(crate_types) = doc.lib.as_ref().and_then(|l| l.crate_type.as_ref()) {
        if !crate_types.iter().any(|t| t == "cdylib") {
            tracing::warn!(
                unit = name,
                "crate-type does not include \"cdylib\"; the toolchain may not produce a .wasm artifact"
            );
        }
    }

    let crate_dir = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| invalid(manifest_path.clone(), "manifest has no parent".to_string()))?;

    Ok(CompilationUnit {
        name: name.to_string(),
        manifest_path,
        crate_dir,
        lib_name,
        target: TargetProfile {
            triple: config.toolchain.target.clone(),
            opt_level: if config.toolchain.release {
                OptLevel::Release
            } else {
                OptLevel::Debug
            },
        },
        output_format: config.output.format,
        wants_source_map: config.output.sourcemap,
    })
}

fn lib_name(doc: &ManifestDoc) -> Option<String> {
    doc.lib
        .as_ref()
        .and_then(|l| l.name.clone())
        .or_else(|| doc.package.as_ref().map(|p| p.name.clone()))
        .map(|n| n.replace('-', "_"))
}
