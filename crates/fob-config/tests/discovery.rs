//! Tests for config file discovery and loading
//!
//! Only TOML and package.json/`fob` formats are supported.

use fob_config::{ConfigDiscovery, ConfigError, LoaderMode, ModuleFormat};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn discovers_fob_toml() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("fob.toml"),
        r#"
[entries]
example = "Cargo.toml"

[output]
dir = "dist/js"
format = "iife"
sourcemap = true

[toolchain]
server_path = "js/"
"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    let found = discovery.find().unwrap();
    assert_eq!(found.file_name().unwrap(), "fob.toml");

    let config = discovery.load().unwrap();
    assert_eq!(config.entries["example"], PathBuf::from("Cargo.toml"));
    assert_eq!(config.output.format, ModuleFormat::Iife);
    assert!(config.output.sourcemap);
    assert_eq!(config.toolchain.server_path.as_deref(), Some("js/"));
}

#[test]
fn discovers_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{
  "name": "test",
  "fob": {
    "entries": { "example": "native/Cargo.toml" },
    "loader": { "mode": "inline" }
  }
}"#,
    )
    .unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    let found = discovery.find().unwrap();
    assert_eq!(found.file_name().unwrap(), "package.json");

    let config = discovery.load().unwrap();
    assert_eq!(
        config.entries["example"],
        PathBuf::from("native/Cargo.toml")
    );
    assert_eq!(config.loader.mode, LoaderMode::Inline);
}

#[test]
fn toml_takes_precedence_over_package_json() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("fob.toml"),
        "[entries]\nfrom_toml = \"Cargo.toml\"\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("package.json"),
        r#"{"fob": {"entries": {"from_json": "Cargo.toml"}}}"#,
    )
    .unwrap();

    let config = ConfigDiscovery::new(dir.path())
        .without_env()
        .load()
        .unwrap();
    assert!(config.entries.contains_key("from_toml"));
    assert!(!config.entries.contains_key("from_json"));
}

#[test]
fn package_json_without_fob_field_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"name": "test"}"#).unwrap();

    let discovery = ConfigDiscovery::new(dir.path()).without_env();
    assert!(discovery.find().is_none());
    assert!(matches!(discovery.load(), Err(ConfigError::NotFound)));
}

#[test]
fn entries_keep_file_order() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("fob.toml"),
        r#"
[entries]
zeta = "zeta/Cargo.toml"
alpha = "alpha/Cargo.toml"
mid = "mid/Cargo.toml"
"#,
    )
    .unwrap();

    let config = ConfigDiscovery::new(dir.path())
        .without_env()
        .load()
        .unwrap();
    let names: Vec<_> = config.entries.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[test]
fn invalid_toml_reports_hint() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fob.toml"), "[entries\nbroken").unwrap();

    let err = ConfigDiscovery::new(dir.path())
        .without_env()
        .load()
        .unwrap_err();
    match err {
        ConfigError::InvalidValue { field, hint } => {
            assert_eq!(field, "toml");
            assert!(hint.unwrap().contains("Invalid TOML"));
        }
        other => panic!("expected InvalidValue, got {other:?}"),
    }
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fob.yaml");
    fs::write(&path, "entries: {}").unwrap();

    let result = ConfigDiscovery::new(dir.path())
        .without_env()
        .load_from(&path);
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[test]
fn environment_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "fob.toml",
            r#"
[entries]
example = "Cargo.toml"

[output]
sourcemap = false
"#,
        )?;
        jail.set_env("FOB_OUTPUT__SOURCEMAP", "true");
        jail.set_env("FOB_TOOLCHAIN__TIMEOUT_SECS", "42");

        let config = ConfigDiscovery::new(jail.directory())
            .load()
            .map_err(|e| e.to_string())?;
        assert!(config.output.sourcemap);
        assert_eq!(config.toolchain.timeout_secs, 42);
        Ok(())
    });
}
