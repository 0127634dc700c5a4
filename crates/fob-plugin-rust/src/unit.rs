//! Compilation units: one native crate mapped to one WebAssembly artifact.

use std::path::{Path, PathBuf};

use fob_config::ModuleFormat;
use serde::{Deserialize, Serialize};

/// Optimization mode passed to the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptLevel {
    Debug,
    Release,
}

impl OptLevel {
    /// Name of the profile directory the toolchain writes into.
    pub fn profile_dir(&self) -> &'static str {
        match self {
            OptLevel::Debug => "debug",
            OptLevel::Release => "release",
        }
    }
}

/// Target triple plus optimization mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetProfile {
    pub triple: String,
    pub opt_level: OptLevel,
}

/// A single crate to compile.
///
/// Created by the [`resolver`](crate::resolver) from the configured entries and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    /// Entry name, unique within a build.
    pub name: String,
    /// Absolute path of the crate's `Cargo.toml`.
    pub manifest_path: PathBuf,
    /// Directory containing the manifest.
    pub crate_dir: PathBuf,
    /// Library target name (hyphens replaced by underscores).
    pub lib_name: String,
    pub target: TargetProfile,
    pub output_format: ModuleFormat,
    pub wants_source_map: bool,
}

impl CompilationUnit {
    /// Per-unit `--target-dir`, so units never share toolchain locks.
    pub fn target_dir(&self, root_target_dir: &Path) -> PathBuf {
        root_target_dir.join(&self.name)
    }

    /// Directory the toolchain places final outputs in.
    pub fn output_dir(&self, root_target_dir: &Path) -> PathBuf {
        self.target_dir(root_target_dir)
            .join(&self.target.triple)
            .join(self.target.opt_level.profile_dir())
    }

    /// Where the artifact must exist after a successful toolchain run.
    pub fn artifact_path(&self, root_target_dir: &Path) -> PathBuf {
        self.output_dir(root_target_dir)
            .join(format!("{}.wasm", self.lib_name))
    }

    /// Companion debug map written next to the artifact, when present.
    pub fn debug_map_path(&self, root_target_dir: &Path) -> PathBuf {
        self.output_dir(root_target_dir)
            .join(format!("{}.wasm.map", self.lib_name))
    }

    /// Dep-info file listing every input the toolchain read.
    pub fn dep_info_path(&self, root_target_dir: &Path) -> PathBuf {
        self.output_dir(root_target_dir)
            .join(format!("{}.d", self.lib_name))
    }
}

#[cfg(test)]
pub(crate) fn test_unit(name: &str, crate_dir: &Path) -> CompilationUnit {
    CompilationUnit {
        name: name.to_string(),
        manifest_path: crate_dir.join("Cargo.toml"),
        crate_dir: crate_dir.to_path_buf(),
        lib_name: name.replace('-', "_"),
        target: TargetProfile {
            triple: "wasm32-unknown-unknown".to_string(),
            opt_level: OptLevel::Release,
        },
        output_format: ModuleFormat::Esm,
        wants_source_map: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_follows_toolchain_layout() {
        let unit = test_unit("my-lib", Path::new("/work/my-lib"));
        let target = Path::new("/work/target/fob-rust");
        assert_eq!(
            unit.artifact_path(target),
            PathBuf::from("/work/target/fob-rust/my-lib/wasm32-unknown-unknown/release/my_lib.wasm")
        );
        assert_eq!(
            unit.dep_info_path(target).file_name().unwrap(),
            "my_lib.d"
        );
        assert_eq!(
            unit.debug_map_path(target).file_name().unwrap(),
            "my_lib.wasm.map"
        );
    }

    #[test]
    fn debug_profile_dir() {
        let mut unit = test_unit("example", Path::new("/x"));
        unit.target.opt_level = OptLevel::Debug;
        assert!(unit.output_dir(Path::new("/t")).ends_with("wasm32-unknown-unknown/debug"));
    }
}
