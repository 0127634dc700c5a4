//! On-disk entry format.
//!
//! Each persisted entry is a directory named after the fingerprint hash:
//!
//! ```text
//! <cache dir>/<hash>/artifact.wasm
//! <cache dir>/<hash>/debug.map      (optional)
//! <cache dir>/<hash>/entry.bin      (bincode EntryMetadata)
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::CacheError;
use super::fingerprint::BuildFingerprint;
use super::store::CachedArtifact;

/// Current cache format version. Increment when format changes.
pub const CACHE_FORMAT_VERSION: u32 = 2;

pub(crate) const ARTIFACT_FILE: &str = "artifact.wasm";
pub(crate) const DEBUG_MAP_FILE: &str = "debug.map";
pub(crate) const METADATA_FILE: &str = "entry.bin";

/// Metadata persisted next to the cached bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// fob-plugin-rust version that wrote the entry.
    pub fob_version: String,

    /// Cache format version.
    pub format_version: u32,

    pub fingerprint: BuildFingerprint,

    pub artifact_len: u64,

    pub debug_map_len: Option<u64>,

    /// BLAKE3 over artifact bytes followed by debug-map bytes.
    pub content_hash: String,

    /// Inputs reported by the toolchain for the build that produced the entry.
    pub declared_inputs: Vec<PathBuf>,

    /// Milliseconds since the Unix epoch.
    pub produced_at_ms: u64,

    pub sequence: u64,
}

impl EntryMetadata {
    pub(crate) fn for_artifact(artifact: &CachedArtifact) -> Self {
        Self {
            fob_version: env!("CARGO_PKG_VERSION").to_string(),
            format_version: CACHE_FORMAT_VERSION,
            fingerprint: artifact.fingerprint.clone(),
            artifact_len: artifact.artifact_bytes.len() as u64,
            debug_map_len: artifact.debug_map_bytes.as_ref().map(|m| m.len() as u64),
            content_hash: content_hash(&artifact.artifact_bytes, artifact.debug_map_bytes.as_deref()),
            declared_inputs: artifact.declared_inputs.clone(),
            produced_at_ms: artifact
                .produced_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            sequence: artifact.sequence,
        }
    }

    /// Check if this metadata is compatible with current version.
    pub fn is_compatible(&self) -> bool {
        self.format_version == CACHE_FORMAT_VERSION
    }

    pub fn size(&self) -> u64 {
        self.artifact_len + self.debug_map_len.unwrap_or(0)
    }

    pub fn produced_at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.produced_at_ms)
    }
}

pub(crate) fn content_hash(artifact: &[u8], debug_map: Option<&[u8]>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(artifact);
    if let Some(map) = debug_map {
        hasher.update(map);
    }
    hasher.finalize().to_hex().to_string()
}

/// Read only the metadata of a persisted entry.
pub(crate) fn read_metadata(entry_dir: &Path) -> Result<EntryMetadata, CacheError> {
    let bytes = std::fs::read(entry_dir.join(METADATA_FILE))?;
    let metadata: EntryMetadata = bincode::deserialize(&bytes)
        .map_err(|e| CacheError::DeserializationError(e.to_string()))?;

    if !metadata.is_compatible() {
        return Err(CacheError::VersionMismatch {
            expected: CACHE_FORMAT_VERSION,
            found: metadata.format_version,
        });
    }

    Ok(metadata)
}

/// Read a full entry and verify it against its metadata.
pub(crate) fn read_entry(
    entry_dir: &Path,
    metadata: &EntryMetadata,
) -> Result<CachedArtifact, CacheError> {
    let artifact_bytes = std::fs::read(entry_dir.join(ARTIFACT_FILE))?;
    if artifact_bytes.len() as u64 != metadata.artifact_len {
        return Err(CacheError::Corrupted(format!(
            "artifact length {} does not match recorded {}",
            artifact_bytes.len(),
            metadata.artifact_len
        )));
    }

    let debug_map_bytes = match metadata.debug_map_len {
        Some(len) => {
            let bytes = std::fs::read(entry_dir.join(DEBUG_MAP_FILE))?;
            if bytes.len() as u64 != len {
                return Err(CacheError::Corrupted(
                    "debug map length does not match".to_string(),
                ));
            }
            Some(bytes)
        }
        None => None,
    };

    if content_hash(&artifact_bytes, debug_map_bytes.as_deref()) != metadata.content_hash {
        return Err(CacheError::Corrupted("content hash mismatch".to_string()));
    }

    Ok(CachedArtifact {
        fingerprint: metadata.fingerprint.clone(),
        artifact_bytes,
        debug_map_bytes,
        declared_inputs: metadata.declared_inputs.clone(),
        produced_at: metadata.produced_at(),
        sequence: metadata.sequence,
    })
}

/// Write an entry into a temporary directory, then rename it into place.
pub(crate) fn write_entry(cache_dir: &Path, artifact: &CachedArtifact) -> Result<(), CacheError> {
    let key = artifact.fingerprint.key();
    let tmp_dir = cache_dir.join(format!(".tmp-{}-{}", key, artifact.sequence));
    let final_dir = cache_dir.join(key);

    if tmp_dir.exists() {
        std::fs::remove_dir_all(&tmp_dir)?;
    }
    std::fs::create_dir_all(&tmp_dir)?;

    let result = (|| -> Result<(), CacheError> {
        std::fs::write(tmp_dir.join(ARTIFACT_FILE), &artifact.artifact_bytes)?;
        if let Some(map) = &artifact.debug_map_bytes {
            std::fs::write(tmp_dir.join(DEBUG_MAP_FILE), map)?;
        }
        let metadata = bincode::serialize(&EntryMetadata::for_artifact(artifact))
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        // Metadata last: an entry without it is never considered valid
        std::fs::write(tmp_dir.join(METADATA_FILE), metadata)?;

        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir)?;
        }
        std::fs::rename(&tmp_dir, &final_dir)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_dir_all(&tmp_dir);
    }
    result
}
