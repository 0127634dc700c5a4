//! In-memory index with optional on-disk persistence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::entry::{self, EntryMetadata};
use super::fingerprint::BuildFingerprint;
use super::{CacheConfig, CacheResult};

/// A cached build output. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub fingerprint: BuildFingerprint,
    pub artifact_bytes: Vec<u8>,
    pub debug_map_bytes: Option<Vec<u8>>,
    /// Input files the toolchain reported for this build.
    pub declared_inputs: Vec<PathBuf>,
    pub produced_at: SystemTime,
    /// Tie-breaker for entries produced within the same clock tick.
    pub sequence: u64,
}

impl CachedArtifact {
    /// Bytes charged against the cache budget.
    pub fn size(&self) -> u64 {
        self.artifact_bytes.len() as u64 + self.debug_map_bytes.as_ref().map_or(0, |m| m.len() as u64)
    }
}

#[derive(Debug, Clone)]
enum Slot {
    /// Bytes held in memory.
    Resident(Arc<CachedArtifact>),
    /// Found on disk at open, bytes not read yet.
    Persisted(Arc<EntryMetadata>),
}

impl Slot {
    fn size(&self) -> u64 {
        match self {
            Slot::Resident(artifact) => artifact.size(),
            Slot::Persisted(meta) => meta.size(),
        }
    }

    fn age(&self) -> (SystemTime, u64) {
        match self {
            Slot::Resident(artifact) => (artifact.produced_at, artifact.sequence),
            Slot::Persisted(meta) => (meta.produced_at(), meta.sequence),
        }
    }

    fn fingerprint(&self) -> &BuildFingerprint {
        match self {
            Slot::Resident(artifact) => &artifact.fingerprint,
            Slot::Persisted(meta) => &meta.fingerprint,
        }
    }

    fn declared_inputs(&self) -> &[PathBuf] {
        match self {
            Slot::Resident(artifact) => &artifact.declared_inputs,
            Slot::Persisted(meta) => &meta.declared_inputs,
        }
    }
}

/// Shared artifact cache.
///
/// Lookups never take the write lock on the hit path. Stores and evictions
/// are serialized so store-then-evict is atomic with respect to other stores.
pub struct ArtifactCache {
    config: CacheConfig,
    entries: DashMap<String, Slot>,
    write_lock: Mutex<()>,
    total_bytes: AtomicU64,
    next_sequence: AtomicU64,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("entries", &self.entries.len())
            .field("total_bytes", &self.total_bytes())
            .field("max_bytes", &self.config.max_bytes)
            .field("persist_dir", &self.config.persist_dir)
            .finish()
    }
}

impl ArtifactCache {
    /// Open a cache, indexing any persisted entries.
    ///
    /// Creates the persistence directory if needed. Entries with unreadable
    /// or incompatible metadata are deleted and skipped.
    pub fn open(config: CacheConfig) -> CacheResult<Self> {
        let cache = Self {
            config,
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
            total_bytes: AtomicU64::new(0),
            next_sequence: AtomicU64::new(0),
        };

        if let Some(dir) = cache.config.persist_dir.clone() {
            std::fs::create_dir_all(&dir)?;
            cache.index_persisted(&dir)?;
        }

        Ok(cache)
    }

    /// In-memory cache with the given budget.
    pub fn in_memory(max_bytes: u64) -> Self {
        Self {
            config: CacheConfig::new(max_bytes),
            entries: DashMap::new(),
            write_lock: Mutex::new(()),
            total_bytes: AtomicU64::new(0),
            next_sequence: AtomicU64::new(0),
        }
    }

    fn index_persisted(&self, dir: &Path) -> CacheResult<()> {
        let _guard = self.write_lock.lock();
        let mut max_sequence = None;

        for dir_entry in std::fs::read_dir(dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            let name = dir_entry.file_name().to_string_lossy().into_owned();

            if !path.is_dir() {
                continue;
            }
            // Leftovers of interrupted writes
            if name.starts_with(".tmp-") {
                let _ = std::fs::remove_dir_all(&path);
                continue;
            }

            match entry::read_metadata(&path) {
                Ok(meta) if meta.fingerprint.key() == name => {
                    max_sequence = max_sequence.max(Some(meta.sequence));
                    self.total_bytes.fetch_add(meta.size(), Ordering::SeqCst);
                    self.entries.insert(name, Slot::Persisted(Arc::new(meta)));
                }
                Ok(_) => {
                    tracing::warn!(entry = %name, "cache entry key mismatch, removing");
                    let _ = std::fs::remove_dir_all(&path);
                }
                Err(err) => {
                    tracing::warn!(entry = %name, error = %err, "unreadable cache entry, removing");
                    let _ = std::fs::remove_dir_all(&path);
                }
            }
        }

        if let Some(seq) = max_sequence {
            self.next_sequence.store(seq + 1, Ordering::SeqCst);
        }
        self.evict_over_budget(None);

        tracing::debug!(
            entries = self.entries.len(),
            bytes = self.total_bytes(),
            "indexed persisted cache"
        );
        Ok(())
    }

    /// Return the entry stored under exactly this fingerprint.
    ///
    /// Any difference in the fingerprint is a miss. A persisted entry that can
    /// no longer be read or verified is removed and reported as a miss.
    pub fn lookup(&self, fingerprint: &BuildFingerprint) -> Option<Arc<CachedArtifact>> {
        // Clone the slot so no shard lock is held during disk reads
        let slot = self.entries.get(fingerprint.key())?.value().clone();
        if slot.fingerprint() != fingerprint {
            return None;
        }

        match slot {
            Slot::Resident(artifact) => Some(artifact),
            Slot::Persisted(meta) => self.load_persisted(fingerprint, &meta),
        }
    }

    /// Declared inputs of the newest entry built from the same sources.
    ///
    /// Used to complete a fingerprint before lookup: the inputs a build of
    /// these sources reported last time are the ones to hash now.
    pub fn declared_inputs_for(&self, sources: &BuildFingerprint) -> Option<Vec<PathBuf>> {
        self.entries
            .iter()
            .filter(|e| {
                let fp = e.value().fingerprint();
                fp.unit_name == sources.unit_name && fp.sources_hash == sources.sources_hash
            })
            .max_by_key(|e| e.value().age())
            .map(|e| e.value().declared_inputs().to_vec())
    }

    fn load_persisted(
        &self,
        fingerprint: &BuildFingerprint,
        meta: &Arc<EntryMetadata>,
    ) -> Option<Arc<CachedArtifact>> {
        let dir = self.config.persist_dir.as_ref()?.join(fingerprint.key());

        match entry::read_entry(&dir, meta) {
            Ok(artifact) => {
                let artifact = Arc::new(artifact);
                if let Some(mut slot) = self.entries.get_mut(fingerprint.key()) {
                    if matches!(&*slot, Slot::Persisted(m) if m.sequence == meta.sequence) {
                        *slot = Slot::Resident(Arc::clone(&artifact));
                    }
                }
                Some(artifact)
            }
            Err(err) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    error = %err,
                    "corrupt cache entry treated as miss"
                );
                self.remove(fingerprint);
                None
            }
        }
    }

    /// Store an artifact, evicting the least recently produced entries while
    /// the budget is exceeded.
    ///
    /// An artifact larger than the whole budget is returned but not retained.
    /// Persistence failures are logged; the in-memory entry still counts.
    pub fn store(
        &self,
        fingerprint: BuildFingerprint,
        artifact_bytes: Vec<u8>,
        debug_map_bytes: Option<Vec<u8>>,
        declared_inputs: Vec<PathBuf>,
    ) -> Arc<CachedArtifact> {
        let _guard = self.write_lock.lock();

        let artifact = Arc::new(CachedArtifact {
            fingerprint,
            artifact_bytes,
            debug_map_bytes,
            declared_inputs,
            produced_at: SystemTime::now(),
            sequence: self.next_sequence.fetch_add(1, Ordering::SeqCst),
        });

        let size = artifact.size();
        if size > self.config.max_bytes {
            tracing::debug!(
                fingerprint = %artifact.fingerprint,
                size,
                budget = self.config.max_bytes,
                "artifact exceeds cache budget, not retained"
            );
            return artifact;
        }

        let key = artifact.fingerprint.key().to_string();

        if let Some(dir) = &self.config.persist_dir {
            if let Err(err) = entry::write_entry(dir, &artifact) {
                tracing::warn!(fingerprint = %artifact.fingerprint, error = %err, "failed to persist cache entry");
            }
        }

        if let Some(previous) = self.entries.insert(key.clone(), Slot::Resident(Arc::clone(&artifact))) {
            self.total_bytes.fetch_sub(previous.size(), Ordering::SeqCst);
        }
        self.total_bytes.fetch_add(size, Ordering::SeqCst);

        self.evict_over_budget(Some(&key));

        tracing::debug!(fingerprint = %artifact.fingerprint, size, "stored artifact");
        artifact
    }

    /// Evict oldest-first until within budget. Caller holds the write lock.
    fn evict_over_budget(&self, keep: Option<&str>) {
        while self.total_bytes() > self.config.max_bytes {
            let oldest = self
                .entries
                .iter()
                .filter(|e| Some(e.key().as_str()) != keep)
                .min_by_key(|e| e.value().age())
                .map(|e| e.key().clone());

            let Some(key) = oldest else {
                break;
            };
            if let Some((key, slot)) = self.entries.remove(&key) {
                self.total_bytes.fetch_sub(slot.size(), Ordering::SeqCst);
                self.remove_persisted(&key);
                tracing::debug!(entry = %key, size = slot.size(), "evicted cache entry");
            }
        }
    }

    fn remove_persisted(&self, key: &str) {
        if let Some(dir) = &self.config.persist_dir {
            let path = dir.join(key);
            if path.exists() {
                if let Err(err) = std::fs::remove_dir_all(&path) {
                    tracing::warn!(entry = %key, error = %err, "failed to delete cache entry");
                }
            }
        }
    }

    /// Remove one entry. Returns true when something was removed.
    pub fn remove(&self, fingerprint: &BuildFingerprint) -> bool {
        let _guard = self.write_lock.lock();
        match self.entries.remove(fingerprint.key()) {
            Some((key, slot)) => {
                self.total_bytes.fetch_sub(slot.size(), Ordering::SeqCst);
                self.remove_persisted(&key);
                true
            }
            None => false,
        }
    }

    /// Remove every entry, including persisted ones.
    pub fn clear(&self) -> CacheResult<()> {
        let _guard = self.write_lock.lock();
        self.entries.clear();
        self.total_bytes.store(0, Ordering::SeqCst);

        if let Some(dir) = &self.config.persist_dir {
            if dir.exists() {
                for dir_entry in std::fs::read_dir(dir)? {
                    let path = dir_entry?.path();
                    if path.is_dir() {
                        std::fs::remove_dir_all(&path)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes currently charged against the budget.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::SeqCst)
    }

    pub fn max_bytes(&self) -> u64 {
        self.config.max_bytes
    }

    pub fn persist_dir(&self) -> Option<&Path> {
        self.config.persist_dir.as_deref()
    }
}
