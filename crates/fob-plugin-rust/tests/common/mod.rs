//! Shared fixtures: a project directory with crates and a fake toolchain.
//!
//! The fake toolchain is a POSIX shell script that follows the real
//! argument shape. Each crate steers it through marker files:
//!
//! - `fail.txt`: print the file to stderr and exit 1
//! - `hang`: record the pid in `.pid` and sleep
//! - `fork-hang`: start a background `sleep`, record its pid in `.child` and
//!   wait for it, the way the real toolchain waits on compiler subprocesses
//! - otherwise copy `artifact.wasm` (and `artifact.wasm.map`) into the
//!   toolchain output layout and write a dep-info file
//! - `input.path`: copy the artifact from the path it names instead, and
//!   list that path as an input in the dep-info file
//!
//! Every invocation appends to `.invocations` in the crate directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use fob_config::RustBuildConfig;
use tempfile::TempDir;
use wasm_encoder::{
    CodeSection, ExportKind, ExportSection, Function, FunctionSection, Instruction, Module,
    TypeSection, ValType,
};

const FAKE_TOOLCHAIN: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "cargo 1.85.0 (fake)"
  exit 0
fi
echo invoked >> .invocations
if [ -f fail.txt ]; then
  cat fail.txt >&2
  exit 1
fi
if [ -f hang ]; then
  echo $$ > .pid
  exec sleep 30
fi
if [ -f fork-hang ]; then
  sleep 30 &
  echo $! > .child
  wait
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
echo "   Compiling $lib" >&2
src=artifact.wasm
inputs="$PWD/src/lib.rs"
if [ -f input.path ]; then
  src=$(cat input.path)
  inputs="$inputs $src"
fi
cp "$src" "$out/$lib.wasm"
if [ -f artifact.wasm.map ]; then
  cp artifact.wasm.map "$out/$lib.wasm.map"
fi
printf '%s: %s\n' "$out/$lib.wasm" "$inputs" > "$out/$lib.d"
"#;

pub struct Project {
    pub dir: TempDir,
    pub toolchain: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let toolchain = dir.path().join("fake-cargo.sh");
        fs::write(&toolchain, FAKE_TOOLCHAIN).unwrap();
        make_executable(&toolchain);
        Self { dir, toolchain }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create crate `name` whose build produces `artifact`.
    pub fn add_crate(&self, name: &str, artifact: &[u8]) -> PathBuf {
        let crate_dir = self.root().join("crates").join(name);
        fs::create_dir_all(crate_dir.join("src")).unwrap();
        fs::write(
            crate_dir.join("Cargo.toml"),
            format!(
                "[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n\n[lib]\ncrate-type = [\"cdylib\"]\n"
            ),
        )
        .unwrap();
        fs::write(crate_dir.join("src/lib.rs"), "#[no_mangle]\npub extern \"C\" fn add(a: i32, b: i32) -> i32 { a + b }\n").unwrap();
        fs::write(crate_dir.join("libname"), name.replace('-', "_")).unwrap();
        fs::write(crate_dir.join("artifact.wasm"), artifact).unwrap();
        crate_dir
    }

    pub fn crate_dir(&self, name: &str) -> PathBuf {
        self.root().join("crates").join(name)
    }

    pub fn mark(&self, name: &str, file: &str, contents: &str) {
        fs::write(self.crate_dir(name).join(file), contents).unwrap();
    }

    pub fn invocations(&self, name: &str) -> usize {
        fs::read_to_string(self.crate_dir(name).join(".invocations"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    pub fn out_dir(&self) -> PathBuf {
        self.root().join("dist")
    }

    /// Config with every entry in `names`, driving the fake toolchain.
    pub fn config(&self, names: &[&str]) -> RustBuildConfig {
        let mut config = RustBuildConfig::default();
        for name in names {
            config = config.with_entry(*name, format!("crates/{name}"));
        }
        config.toolchain.cargo = self.toolchain.clone();
        config.toolchain.timeout_secs = 30;
        config.output.dir = PathBuf::from("dist");
        config.concurrency.jobs = Some(2);
        config
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

/// A valid module exporting `add(i32, i32) -> i32`.
pub fn add_module() -> Vec<u8> {
    let mut module = Module::new();

    let mut types = TypeSection::new();
    types.ty().function([ValType::I32, ValType::I32], [ValType::I32]);
    module.section(&types);

    let mut functions = FunctionSection::new();
    functions.function(0);
    module.section(&functions);

    let mut exports = ExportSection::new();
    exports.export("add", ExportKind::Func, 0);
    module.section(&exports);

    let mut code = CodeSection::new();
    let mut body = Function::new([]);
    body.instruction(&Instruction::LocalGet(0));
    body.instruction(&Instruction::LocalGet(1));
    body.instruction(&Instruction::I32Add);
    body.instruction(&Instruction::End);
    code.function(&body);
    module.section(&code);

    module.finish()
}

/// True while a process with `pid` is running. Zombies awaiting their
/// reaper count as gone.
#[cfg(unix)]
pub fn process_alive(pid: &str) -> bool {
    let stat = std::path::Path::new("/proc").join(pid.trim()).join("stat");
    if let Ok(stat) = fs::read_to_string(&stat) {
        // state follows the parenthesized command name
        return stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X");
    }
    if std::path::Path::new("/proc/self").exists() {
        return false;
    }
    std::process::Command::new("kill")
        .args(["-0", pid.trim()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
