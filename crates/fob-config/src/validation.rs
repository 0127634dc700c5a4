//! Pluggable config validation strategies
//!
//! Separates filesystem validation (for CLI use) from schema validation (for library use).

use std::path::Path;

use crate::config::RustBuildConfig;
use crate::error::{ConfigError, Result};

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    /// Validate a build configuration
    fn validate(&self, config: &RustBuildConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// Use this when manifests are generated or live outside the project root.
///
/// # Example
///
/// ```
/// use fob_config::{RustBuildConfig, SchemaValidator, ConfigValidator};
///
/// let config = RustBuildConfig::default().with_entry("example", "Cargo.toml");
///
/// let validator = SchemaValidator;
/// validator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &RustBuildConfig) -> Result<()> {
        if config.entries.is_empty() {
            return Err(ConfigError::NoEntries);
        }

        for (name, manifest) in &config.entries {
            if !is_valid_unit_name(name) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("entry name '{name}' is not a valid unit name"),
                    hint: Some(
                        "Use ASCII letters, digits, '_' or '-', starting with a letter or '_'"
                            .to_string(),
                    ),
                });
            }
            if manifest.as_os_str().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: format!("entry '{name}' has an empty manifest path"),
                    hint: Some("Point the entry at the crate's Cargo.toml".to_string()),
                });
            }
        }

        if config.toolchain.timeout_secs == 0 {
            return Err(ConfigError::SchemaValidation {
                message: "toolchain timeout must be at least 1 second".to_string(),
                hint: Some("Set toolchain.timeout_secs to a positive value".to_string()),
            });
        }

        if config.toolchain.target.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "toolchain target triple cannot be empty".to_string(),
                hint: Some("The default is wasm32-unknown-unknown".to_string()),
            });
        }

        if config.concurrency.jobs == Some(0) {
            return Err(ConfigError::SchemaValidation {
                message: "concurrency.jobs must be at least 1".to_string(),
                hint: Some("Remove the field to use available parallelism".to_string()),
            });
        }

        if config.dev.debounce_ms > 60_000 {
            return Err(ConfigError::SchemaValidation {
                message: format!(
                    "debounce window of {}ms is out of range (0 to 60000)",
                    config.dev.debounce_ms
                ),
                hint: Some("Use a debounce window below one minute".to_string()),
            });
        }

        if config.cache.enabled && config.cache.max_bytes == 0 {
            return Err(ConfigError::SchemaValidation {
                message: "cache max_bytes must be positive when the cache is enabled".to_string(),
                hint: Some("Set cache.enabled = false to disable caching".to_string()),
            });
        }

        if let Some(global) = &config.output.global_name {
            if !is_js_identifier(global) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("global name '{global}' is not a valid identifier"),
                    hint: None,
                });
            }
            if is_reserved_word(global) {
                return Err(ConfigError::SchemaValidation {
                    message: format!("global name '{global}' is a reserved word"),
                    hint: Some(format!("Use '{global}_' or another identifier")),
                });
            }
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Validates that every entry manifest exists on disk.
///
/// # Example
///
/// ```no_run
/// use fob_config::{RustBuildConfig, FsValidator, ConfigValidator};
///
/// let config = RustBuildConfig::default().with_entry("example", "Cargo.toml");
///
/// let validator = FsValidator::new(".");
/// validator.validate(&config).unwrap();
/// ```
pub struct FsValidator {
    root: std::path::PathBuf,
}

impl FsValidator {
    /// Create a new filesystem validator with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &RustBuildConfig) -> Result<()> {
        // First run schema validation
        SchemaValidator.validate(config)?;

        for (name, manifest) in &config.entries {
            let mut path = self.root.join(manifest);
            if path.is_dir() {
                path.push("Cargo.toml");
            }
            if !path.is_file() {
                return Err(ConfigError::EntryNotFound {
                    entry: name.clone(),
                    path,
                });
            }
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &RustBuildConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for filesystem validation
pub fn validate_fs(config: &RustBuildConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}

/// Unit names end up in file names and module specifiers.
pub fn is_valid_unit_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// JavaScript words that cannot name a binding in strict-mode code.
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}
