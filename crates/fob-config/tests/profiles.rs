//! Profile override behavior through file discovery.

use fob_config::{discover_with_profile, ConfigDiscovery, ConfigError, ModuleFormat};
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir) {
    fs::write(
        dir.path().join("fob.toml"),
        r#"
[entries]
example = "Cargo.toml"

[toolchain]
release = false
cargo_args = ["--features", "dev"]

[profiles.production.toolchain]
release = true
cargo_args = []

[profiles.production.output]
format = "iife"
sourcemap = true
"#,
    )
    .unwrap();
}

#[test]
fn profile_overrides_base_values() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let config = ConfigDiscovery::new(dir.path())
        .without_env()
        .load_with_profile("production")
        .unwrap();

    assert!(config.toolchain.release);
    assert!(config.toolchain.cargo_args.is_empty());
    assert_eq!(config.output.format, ModuleFormat::Iife);
    assert!(config.output.sourcemap);
    assert!(config.entries.contains_key("example"));
}

#[test]
fn base_config_unchanged_without_profile() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let config = ConfigDiscovery::new(dir.path())
        .without_env()
        .load()
        .unwrap()
        .materialize_profile(None)
        .unwrap();

    assert!(!config.toolchain.release);
    assert_eq!(config.toolchain.cargo_args, vec!["--features", "dev"]);
    assert_eq!(config.output.format, ModuleFormat::Esm);
}

#[test]
fn missing_profile_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_config(&dir);

    let result = discover_with_profile(dir.path(), "staging");
    assert!(matches!(
        result,
        Err(ConfigError::InvalidProfileOverride { .. })
    ));
}
