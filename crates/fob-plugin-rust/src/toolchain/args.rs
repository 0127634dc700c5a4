//! Argument vector and environment for toolchain invocations.

use std::ffi::OsString;
use std::path::Path;

use fob_config::ToolchainOptions;

use crate::unit::{CompilationUnit, OptLevel};

/// Variables inherited from the parent; everything else is cleared.
#[cfg(not(windows))]
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "CARGO_HOME", "RUSTUP_HOME", "RUSTUP_TOOLCHAIN"];

#[cfg(windows)]
const PASSTHROUGH_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "CARGO_HOME",
    "RUSTUP_HOME",
    "RUSTUP_TOOLCHAIN",
    "SYSTEMROOT",
    "USERPROFILE",
    "TEMP",
    "TMP",
];

/// Arguments for building one unit.
///
/// `build --lib --manifest-path <m> --target <triple> --target-dir <dir>
/// [--release] --color never --message-format short <extra...>`
pub fn build_args(
    unit: &CompilationUnit,
    root_target_dir: &Path,
    options: &ToolchainOptions,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "build".into(),
        "--lib".into(),
        "--manifest-path".into(),
        unit.manifest_path.clone().into(),
        "--target".into(),
        unit.target.triple.clone().into(),
        "--target-dir".into(),
        unit.target_dir(root_target_dir).into(),
    ];

    if unit.target.opt_level == OptLevel::Release {
        args.push("--release".into());
    }

    args.extend(
        ["--color", "never", "--message-format", "short"]
            .into_iter()
            .map(OsString::from),
    );
    args.extend(options.cargo_args.iter().map(OsString::from));
    args
}

/// The complete environment of the child process.
pub fn build_env(options: &ToolchainOptions) -> Vec<(OsString, OsString)> {
    let mut env: Vec<(OsString, OsString)> = PASSTHROUGH_ENV
        .iter()
        .filter_map(|key| std::env::var_os(key).map(|value| (OsString::from(key), value)))
        .collect();

    env.push(("CARGO_TERM_COLOR".into(), "never".into()));
    env.push(("CARGO_INCREMENTAL".into(), "0".into()));

    env.extend(
        options
            .env
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v))),
    );

    if let Some(flags) = &options.rustflags {
        env.push(("RUSTFLAGS".into(), flags.into()));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::test_unit;

    #[test]
    fn release_args_have_fixed_shape() {
        let unit = test_unit("example", Path::new("/work/example"));
        let mut options = ToolchainOptions::default();
        options.cargo_args = vec!["--features".to_string(), "simd".to_string()];

        let args = build_args(&unit, Path::new("/work/target"), &options);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        assert_eq!(
            args,
            vec![
                "build",
                "--lib",
                "--manifest-path",
                "/work/example/Cargo.toml",
                "--target",
                "wasm32-unknown-unknown",
                "--target-dir",
                "/work/target/example",
                "--release",
                "--color",
                "never",
                "--message-format",
                "short",
                "--features",
                "simd",
            ]
        );
    }

    #[test]
    fn debug_build_omits_release_flag() {
        let mut unit = test_unit("example", Path::new("/w"));
        unit.target.opt_level = OptLevel::Debug;
        let args = build_args(&unit, Path::new("/t"), &ToolchainOptions::default());
        assert!(!args.iter().any(|a| a == "--release"));
    }

    #[test]
    fn env_contains_pinned_values() {
        let mut options = ToolchainOptions::default();
        options.rustflags = Some("-C opt-level=z".to_string());
        options
            .env
            .insert("SOURCE_DATE_EPOCH".to_string(), "0".to_string());

        let env = build_env(&options);
        let get = |key: &str| {
            env.iter()
                .rev()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.to_string_lossy().into_owned())
        };

        assert_eq!(get("CARGO_TERM_COLOR").as_deref(), Some("never"));
        assert_eq!(get("CARGO_INCREMENTAL").as_deref(), Some("0"));
        assert_eq!(get("RUSTFLAGS").as_deref(), Some("-C opt-level=z"));
        assert_eq!(get("SOURCE_DATE_EPOCH").as_deref(), Some("0"));
        assert!(get("CARGO_TARGET_DIR").is_none());
    }
}
