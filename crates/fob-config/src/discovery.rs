//! File-based config discovery for CLI use
//!
//! Handles finding fob configuration files and layering them with `figment`:
//! built-in defaults, then the discovered file, then `FOB_`-prefixed
//! environment variables (`FOB_OUTPUT__SOURCEMAP=true`).

use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde_json::Value;

use crate::config::RustBuildConfig;
use crate::error::{ConfigError, Result};

/// Name of the TOML config file searched for in the project root.
pub const CONFIG_FILE_NAME: &str = "fob.toml";

/// File-based configuration discovery
///
/// Searches for fob configuration files in conventional locations and loads them.
/// Library users should prefer `RustBuildConfig::from_value()`.
///
/// # Example
///
/// ```no_run
/// use fob_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
    use_env: bool,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            use_env: true,
        }
    }

    /// Disable the environment-variable layer.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Root directory this discovery searches.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: fob.toml
    /// 2. package.json (fob field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE_NAME);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.exists() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed.get("fob").is_some_and(|v| !v.is_null()) {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load config from discovered file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<RustBuildConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path)
    }

    /// Load config with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<RustBuildConfig> {
        self.load()?.materialize_profile(Some(profile))
    }

    /// Load config from a specific file path
    pub fn load_from(&self, path: &Path) -> Result<RustBuildConfig> {
        tracing::debug!(path = %path.display(), "loading config");

        let value = if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            read_package_json(path)?
        } else if path.extension().and_then(|e| e.to_str()) == Some("toml") {
            read_toml(path)?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        };

        self.layer(value)
    }

    /// Layer defaults, the file value and the environment.
    fn layer(&self, file_value: Value) -> Result<RustBuildConfig> {
        let declared_order = declared_entry_order(&file_value);

        let mut figment = Figment::from(Serialized::defaults(RustBuildConfig::default()))
            .merge(Serialized::defaults(file_value));

        if self.use_env {
            figment = figment.merge(Env::prefixed("FOB_").split("__"));
        }

        let mut config: RustBuildConfig =
            figment.extract().map_err(|e| ConfigError::InvalidValue {
                field: "configuration".to_string(),
                hint: Some(e.to_string()),
            })?;

        // figment dictionaries are sorted; restore the order entries were declared in
        config.entries.sort_by(|a, _, b, _| {
            let pos = |key: &String| {
                declared_order
                    .iter()
                    .position(|k| k == key)
                    .unwrap_or(usize::MAX)
            };
            pos(a).cmp(&pos(b))
        });

        Ok(config)
    }
}

fn read_toml(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    let toml_val: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: "toml".to_string(),
        hint: Some(format!("Invalid TOML syntax: {}", e)),
    })?;

    serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
        field: "toml".to_string(),
        hint: Some(format!("TOML to JSON conversion failed: {}", e)),
    })
}

fn read_package_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;

    let parsed: Value = serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
        field: "package.json".to_string(),
        hint: Some(format!("Invalid JSON: {}", e)),
    })?;

    match parsed.get("fob") {
        Some(value) if !value.is_null() => Ok(value.clone()),
        Some(_) => Err(ConfigError::InvalidValue {
            field: "fob".to_string(),
            hint: Some("The 'fob' field cannot be null".to_string()),
        }),
        None => Err(ConfigError::InvalidValue {
            field: "fob".to_string(),
            hint: Some("Add a 'fob' field to your package.json".to_string()),
        }),
    }
}

fn declared_entry_order(value: &Value) -> Vec<String> {
    value
        .get("entries")
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Discover and load config from the given directory (convenience function)
///
/// # Example
///
/// ```no_run
/// use fob_config::discover;
///
/// let config = discover(".").unwrap();
/// ```
pub fn discover(root: impl AsRef<Path>) -> Result<RustBuildConfig> {
    ConfigDiscovery::new(root).load()
}

/// Discover and load config with profile (convenience function)
pub fn discover_with_profile(root: impl AsRef<Path>, profile: &str) -> Result<RustBuildConfig> {
    ConfigDiscovery::new(root).load_with_profile(profile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_order_reads_entry_keys() {
        let value: Value =
            serde_json::from_str(r#"{"entries": {"b": "b/Cargo.toml", "a": "a/Cargo.toml"}}"#)
                .unwrap();
        assert_eq!(declared_entry_order(&value), vec!["b", "a"]);
    }

    #[test]
    fn declared_order_empty_without_entries() {
        assert!(declared_entry_order(&Value::Null).is_empty());
    }
}
