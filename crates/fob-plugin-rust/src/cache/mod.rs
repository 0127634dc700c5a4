//! Content-addressed artifact cache.
//!
//! Skips toolchain invocations when a unit's inputs are unchanged. Entries
//! are keyed by a [`BuildFingerprint`] and evicted least-recently-produced
//! first once the configured byte budget is exceeded.
//!
//! # Architecture
//!
//! - **Content-addressed**: keys are BLAKE3 hashes of build inputs
//! - **Lock-free lookups**: the index is a `DashMap` of immutable entries
//! - **Serialized writes**: store-then-evict runs under one short mutex
//! - **Optional persistence**: one directory per entry, written atomically
//!
//! # Usage
//!
//! ```rust,no_run
//! use fob_plugin_rust::cache::{ArtifactCache, CacheConfig};
//!
//! # fn example() -> Result<(), fob_plugin_rust::cache::CacheError> {
//! let cache = ArtifactCache::open(
//!     CacheConfig::new(64 * 1024 * 1024).with_persist_dir("target/fob-rust/cache"),
//! )?;
//! assert!(cache.total_bytes() <= cache.max_bytes());
//! # Ok(())
//! # }
//! ```

mod entry;
pub mod fingerprint;
mod store;

pub use entry::{CACHE_FORMAT_VERSION, EntryMetadata};
pub use fingerprint::BuildFingerprint;
pub use store::{ArtifactCache, CachedArtifact};

use std::path::PathBuf;

/// Configuration for the artifact cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Byte budget for artifact and debug-map bytes combined.
    pub max_bytes: u64,

    /// Directory entries are persisted to. In-memory only when `None`.
    pub persist_dir: Option<PathBuf>,
}

impl CacheConfig {
    /// Create an in-memory cache config with the given budget.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            persist_dir: None,
        }
    }

    /// Persist entries under `dir` so they survive restarts.
    pub fn with_persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persist_dir = Some(dir.into());
        self
    }

    /// Build from the declarative cache options.
    pub fn from_options(options: &fob_config::CacheOptions, dir: PathBuf) -> Self {
        let config = Self::new(options.max_bytes);
        if options.persist {
            config.with_persist_dir(dir)
        } else {
            config
        }
    }
}

/// Error types for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// IO error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Cache version mismatch.
    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    /// Cache corrupted.
    #[error("cache corrupted: {0}")]
    Corrupted(String),
}

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_options_respects_persist_flag() {
        let mut options = fob_config::CacheOptions::default();
        let config = CacheConfig::from_options(&options, PathBuf::from("/tmp/cache"));
        assert_eq!(config.persist_dir, Some(PathBuf::from("/tmp/cache")));

        options.persist = false;
        let config = CacheConfig::from_options(&options, PathBuf::from("/tmp/cache"));
        assert!(config.persist_dir.is_none());
        assert_eq!(config.max_bytes, options.max_bytes);
    }
}
