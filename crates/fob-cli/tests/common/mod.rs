//! A throwaway project with one crate per entry and a fake toolchain.
//!
//! The fake toolchain copies `artifact.wasm` from the crate directory into
//! the output layout the real one would use. A `fail.txt` in the crate makes
//! it print the file to stderr and exit 1.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const FAKE_TOOLCHAIN: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "cargo 1.85.0 (fake)"
  exit 0
fi
if [ -f fail.txt ]; then
  cat fail.txt >&2
  exit 1
fi
target_dir=""
target=""
profile=debug
while [ $# -gt 0 ]; do
  case "$1" in
    --target-dir) target_dir="$2"; shift ;;
    --target) target="$2"; shift ;;
    --release) profile=release ;;
  esac
  shift
done
out="$target_dir/$target/$profile"
mkdir -p "$out"
lib=$(cat libname)
cp artifact.wasm "$out/$lib.wasm"
printf '%s: %s\n' "$out/$lib.wasm" "$PWD/src/lib.rs" > "$out/$lib.d"
"#;

/// Smallest valid WebAssembly module.
pub const EMPTY_MODULE: &[u8] = b"\0asm\x01\0\0\0";

pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let toolchain = dir.path().join("fake-cargo.sh");
        fs::write(&toolchain, FAKE_TOOLCHAIN).unwrap();
        make_executable(&toolchain);
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_crate(&self, name: &str) -> PathBuf {
        let crate_dir = self.root().join("crates").join(name);
        fs::create_dir_all(crate_dir.join("src")).unwrap();
        fs::write(
            crate_dir.join("Cargo.toml"),
            format!(
                "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n\n[lib]\ncrate-type = [\"cdylib\"]\n"
            ),
        )
        .unwrap();
        fs::write(crate_dir.join("src/lib.rs"), "").unwrap();
        fs::write(crate_dir.join("libname"), name.replace('-', "_")).unwrap();
        fs::write(crate_dir.join("artifact.wasm"), EMPTY_MODULE).unwrap();
        crate_dir
    }

    /// Write `fob.toml` with one entry per name, driving the fake toolchain.
    pub fn write_config(&self, names: &[&str]) {
        let mut config = String::from("[entries]\n");
        for name in names {
            config.push_str(&format!("{name} = \"crates/{name}\"\n"));
        }
        config.push_str(&format!(
            "\n[output]\ndir = \"dist\"\n\n[toolchain]\ncargo = \"{}\"\ntimeout_secs = 30\n",
            self.root().join("fake-cargo.sh").display()
        ));
        fs::write(self.root().join("fob.toml"), config).unwrap();
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("dist")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root().join("target/fob-rust/cache")
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
