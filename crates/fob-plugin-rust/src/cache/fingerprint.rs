//! Build fingerprints using BLAKE3 content-addressed hashing.
//!
//! The fingerprint is a deterministic hash of every input that affects the
//! artifact, so any change produces a different key and old entries simply
//! stop matching.
//!
//! Hashing happens in two steps. The sources hash covers the crate itself,
//! its lockfile and the toolchain flags. The final key folds in the files the
//! toolchain reported reading outside the crate (path dependencies, files
//! pulled in with `include_bytes!`), which are only known after a build.

use std::path::{Path, PathBuf};

use blake3::Hasher;
use fob_config::ToolchainOptions;
use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use crate::unit::CompilationUnit;

/// Current fingerprint format version. Increment when hashed inputs change.
const FINGERPRINT_VERSION: u32 = 2;

/// Cache key for one unit's build inputs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildFingerprint {
    pub unit_name: String,
    /// Hex-encoded BLAKE3 hash over the crate's own inputs.
    pub sources_hash: String,
    /// Hex-encoded BLAKE3 hash over the sources hash and declared inputs.
    pub inputs_hash: String,
}

impl BuildFingerprint {
    /// Key used for the cache index and the on-disk entry directory.
    pub fn key(&self) -> &str {
        &self.inputs_hash
    }

    /// The same sources with `declared` folded into the key.
    ///
    /// Inputs inside the crate directory are already covered by the sources
    /// hash, and inputs below `exclude` are build products; both are skipped.
    /// A missing input hashes differently from any content.
    pub fn with_declared_inputs(
        &self,
        crate_dir: &Path,
        declared: &[PathBuf],
        exclude: &[PathBuf],
    ) -> std::io::Result<Self> {
        let mut external: Vec<&Path> = declared
            .iter()
            .map(PathBuf::as_path)
            .filter(|path| !path.starts_with(crate_dir))
            .filter(|path| !exclude.iter().any(|dir| path.starts_with(dir)))
            .collect();
        external.sort();
        external.dedup();

        let mut hasher = Hasher::new();
        update_str(&mut hasher, &self.sources_hash);
        for path in external {
            update_str(&mut hasher, &path.to_string_lossy());
            match std::fs::read(path) {
                Ok(content) => {
                    hasher.update(b"\x01");
                    hasher.update(blake3::hash(&content).as_bytes());
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    hasher.update(b"\x00");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Self {
            unit_name: self.unit_name.clone(),
            sources_hash: self.sources_hash.clone(),
            inputs_hash: hasher.finalize().to_hex().to_string(),
        })
    }
}

impl std::fmt::Display for BuildFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let short = self.inputs_hash.get(..12).unwrap_or(&self.inputs_hash);
        write!(f, "{}@{}", self.unit_name, short)
    }
}

/// Compute the fingerprint for a unit, before any declared inputs are known.
///
/// The sources hash covers, in order:
/// 1. Fingerprint format version
/// 2. Unit name
/// 3. Manifest path and content
/// 4. The crate's source tree (sorted relative path + content hash)
/// 5. The nearest `Cargo.lock` at or above the crate, if any
/// 6. Toolchain version
/// 7. Target triple and optimization level
/// 8. Output format and debug-map flag
/// 9. Extra toolchain arguments, `RUSTFLAGS` and the pinned environment
///
/// `exclude` lists directories skipped during the tree walk (the build's
/// own target directory when it sits inside the crate). Use
/// [`BuildFingerprint::with_declared_inputs`] to fold in inputs reported by
/// a previous build.
pub fn compute(
    unit: &CompilationUnit,
    toolchain_version: &str,
    options: &ToolchainOptions,
    exclude: &[PathBuf],
) -> std::io::Result<BuildFingerprint> {
    let mut hasher = Hasher::new();

    hasher.update(&FINGERPRINT_VERSION.to_le_bytes());

    update_str(&mut hasher, &unit.name);

    update_str(&mut hasher, &unit.manifest_path.to_string_lossy());
    let manifest = std::fs::read(&unit.manifest_path)?;
    hasher.update(blake3::hash(&manifest).as_bytes());

    hash_source_tree(&mut hasher, &unit.crate_dir, exclude)?;

    match find_lockfile(&unit.crate_dir) {
        Some(lockfile) => {
            let content = std::fs::read(&lockfile)?;
            hasher.update(b"\x01");
            hasher.update(blake3::hash(&content).as_bytes());
        }
        None => {
            hasher.update(b"\x00");
        }
    }

    update_str(&mut hasher, toolchain_version);

    update_str(&mut hasher, &unit.target.triple);
    update_str(&mut hasher, unit.target.opt_level.profile_dir());

    update_str(&mut hasher, unit.output_format.as_str());
    hasher.update(&[u8::from(unit.wants_source_map)]);

    for arg in &options.cargo_args {
        update_str(&mut hasher, arg);
    }
    hasher.update(b"\x01");
    update_str(&mut hasher, options.rustflags.as_deref().unwrap_or(""));
    // BTreeMap iterates in key order
    for (key, value) in &options.env {
        update_str(&mut hasher, key);
        update_str(&mut hasher, value);
    }

    let sources = BuildFingerprint {
        unit_name: unit.name.clone(),
        sources_hash: hasher.finalize().to_hex().to_string(),
        inputs_hash: String::new(),
    };
    sources.with_declared_inputs(&unit.crate_dir, &[], exclude)
}

/// The lockfile that pins the crate's dependencies: its own, or the one at
/// the root of the workspace it belongs to.
fn find_lockfile(crate_dir: &Path) -> Option<PathBuf> {
    crate_dir
        .ancestors()
        .map(|dir| dir.join("Cargo.lock"))
        .find(|path| path.is_file())
}

fn update_str(hasher: &mut Hasher, value: &str) {
    hasher.update(value.as_bytes());
    hasher.update(b"\0"); // separator
}

/// Hash every regular file under `root`, skipping `target/` and hidden entries.
fn hash_source_tree(hasher: &mut Hasher, root: &Path, exclude: &[PathBuf]) -> std::io::Result<()> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry, exclude));

    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
        // Normalize separators so the hash is platform independent
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        update_str(hasher, &relative);
        let content = std::fs::read(entry.path())?;
        hasher.update(blake3::hash(&content).as_bytes());
    }

    Ok(())
}

fn is_skipped(entry: &DirEntry, exclude: &[PathBuf]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    if entry.file_type().is_dir() {
        if entry.depth() == 1 && name == "target" {
            return true;
        }
        if exclude.iter().any(|dir| entry.path() == dir) {
            return true;
        }
    }
    false
}
