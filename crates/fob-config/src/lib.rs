//! Configuration for fob's Rust-to-WebAssembly builds.
//!
//! `RustBuildConfig` is the declarative surface: which crates to compile,
//! where outputs go and how the toolchain is driven. Loading from disk lives
//! in [`discovery`], validation strategies in [`validation`].

pub mod config;
pub mod discovery;
pub mod error;
pub mod options;
pub mod validation;

// Re-export main types
pub use config::*;
pub use error::*;
pub use options::*;

// Re-export discovery and validation
pub use discovery::{discover, discover_with_profile, ConfigDiscovery, CONFIG_FILE_NAME};
pub use validation::{
    is_reserved_word, is_valid_unit_name, validate_fs, validate_schema, ConfigValidator, FsValidator,
    SchemaValidator,
};
