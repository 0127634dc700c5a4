//! High-level configuration structure for Rust-to-WebAssembly builds.
//!
//! This module provides the main `RustBuildConfig` struct and profile merging logic.
//! For file discovery, see the `discovery` module.

use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::options::{
    CacheOptions, ConcurrencyOptions, DevOptions, LoaderOptions, OutputOptions, ToolchainOptions,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RustBuildConfig {
    /// Entry name → path of the native project descriptor, in declaration order.
    #[serde(default)]
    pub entries: IndexMap<String, PathBuf>,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub toolchain: ToolchainOptions,

    #[serde(default)]
    pub loader: LoaderOptions,

    #[serde(default)]
    pub cache: CacheOptions,

    #[serde(default)]
    pub concurrency: ConcurrencyOptions,

    #[serde(default)]
    pub dev: DevOptions,

    #[serde(default)]
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub profiles: HashMap<String, ProfileConfig>,
}

/// Partial overrides applied on top of the base configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(flatten)]
    pub overrides: serde_json::Map<String, Value>,
}

impl RustBuildConfig {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use fob_config::RustBuildConfig;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let value = json!({
    ///     "entries": { "example": "Cargo.toml" },
    ///     "output": { "format": "iife", "sourcemap": true }
    /// });
    ///
    /// let config = RustBuildConfig::from_value(value).unwrap();
    /// assert_eq!(config.entries["example"], PathBuf::from("Cargo.toml"));
    /// assert!(config.output.sourcemap);
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Add an entry, replacing any previous manifest for the same name.
    pub fn with_entry(mut self, name: impl Into<String>, manifest: impl Into<PathBuf>) -> Self {
        self.entries.insert(name.into(), manifest.into());
        self
    }

    /// Apply the named profile's overrides.
    ///
    /// An unknown profile name is an error; `None` returns the config unchanged.
    pub fn materialize_profile(self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };

        let profile_cfg = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidProfileOverride {
                message: format!("profile '{name}' is not defined"),
            })?;

        let profiles = self.profiles.clone();
        let mut base =
            serde_json::to_value(&self).map_err(|err| ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            })?;
        merge_values(&mut base, &Value::Object(profile_cfg.overrides));

        let mut merged: RustBuildConfig =
            serde_json::from_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
                message: err.to_string(),
            })?;
        merged.profiles = profiles;
        Ok(merged)
    }

    /// Directory the toolchain writes into, relative to `root` when not absolute.
    pub fn target_dir(&self, root: &std::path::Path) -> PathBuf {
        let dir = self
            .toolchain
            .target_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("target").join("fob-rust"));
        if dir.is_absolute() {
            dir
        } else {
            root.join(dir)
        }
    }

    /// Artifact cache directory, relative to `root` when not absolute.
    pub fn cache_dir(&self, root: &std::path::Path) -> PathBuf {
        match &self.cache.dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => root.join(dir),
            None => self.target_dir(root).join("cache"),
        }
    }

    /// Output directory, relative to `root` when not absolute.
    pub fn out_dir(&self, root: &std::path::Path) -> PathBuf {
        if self.output.dir.is_absolute() {
            self.output.dir.clone()
        } else {
            root.join(&self.output.dir)
        }
    }
}

pub(crate) fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ModuleFormat;
    use serde_json::json;
    use std::path::Path;

    #[test]
    fn from_value_creates_config() {
        let value = json!({
            "entries": { "example": "Cargo.toml" },
            "output": { "dir": "dist/js", "format": "iife", "sourcemap": true },
            "toolchain": { "server_path": "js/" }
        });

        let config = RustBuildConfig::from_value(value).unwrap();
        assert_eq!(config.entries.len(), 1);
        assert_eq!(config.output.format, ModuleFormat::Iife);
        assert_eq!(config.toolchain.server_path.as_deref(), Some("js/"));
    }

    #[test]
    fn entries_keep_declaration_order() {
        let config = RustBuildConfig::default()
            .with_entry("zeta", "zeta/Cargo.toml")
            .with_entry("alpha", "alpha/Cargo.toml");
        let names: Vec<_> = config.entries.keys().cloned().collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn profile_merging_works() {
        let value = json!({
            "entries": { "example": "Cargo.toml" },
            "toolchain": { "release": false, "timeout_secs": 30 },
            "profiles": {
                "production": {
                    "toolchain": { "release": true },
                    "output": { "sourcemap": true }
                }
            }
        });

        let config = RustBuildConfig::from_value(value)
            .unwrap()
            .materialize_profile(Some("production"))
            .unwrap();

        assert!(config.toolchain.release);
        assert_eq!(config.toolchain.timeout_secs, 30);
        assert!(config.output.sourcemap);
        assert!(config.profiles.contains_key("production"));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let result = RustBuildConfig::default().materialize_profile(Some("missing"));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidProfileOverride { .. })
        ));
    }

    #[test]
    fn directories_resolve_against_root() {
        let config = RustBuildConfig::default();
        let root = Path::new("/project");
        assert_eq!(config.target_dir(root), root.join("target/fob-rust"));
        assert_eq!(config.cache_dir(root), root.join("target/fob-rust/cache"));
        assert_eq!(config.out_dir(root), root.join("dist/js"));
    }
}
