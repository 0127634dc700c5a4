//! Composition of artifact maps with embedding spans.

use super::{DebugMap, Mapping};

/// How artifact bytes are represented inside the enclosing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanEncoding {
    /// Byte for byte.
    Raw,
    /// Standard base64: every 3 artifact bytes become 4 output bytes.
    Base64,
}

/// Where a run of artifact bytes landed inside the enclosing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Embedding {
    pub artifact_start: u64,
    pub bundle_start: u64,
    /// Length in artifact bytes.
    pub len: u64,
    pub encoding: SpanEncoding,
}

impl Embedding {
    /// Whole artifact embedded byte for byte at `bundle_start`.
    pub fn raw(bundle_start: u64, len: u64) -> Self {
        Self {
            artifact_start: 0,
            bundle_start,
            len,
            encoding: SpanEncoding::Raw,
        }
    }

    /// Whole artifact embedded as base64 at `bundle_start`.
    pub fn base64(bundle_start: u64, len: u64) -> Self {
        Self {
            artifact_start: 0,
            bundle_start,
            len,
            encoding: SpanEncoding::Base64,
        }
    }

    /// Bytes the span occupies in the enclosing output.
    pub fn bundle_len(&self) -> u64 {
        match self.encoding {
            SpanEncoding::Raw => self.len,
            SpanEncoding::Base64 => self.len.div_ceil(3) * 4,
        }
    }

    fn contains_bundle(&self, offset: u64) -> bool {
        offset >= self.bundle_start && offset < self.bundle_start + self.bundle_len()
    }

    /// Output offset of an artifact offset, if the span covers it.
    pub fn to_bundle(&self, artifact_offset: u64) -> Option<u64> {
        let rel = artifact_offset.checked_sub(self.artifact_start)?;
        if rel >= self.len {
            return None;
        }
        Some(match self.encoding {
            SpanEncoding::Raw => self.bundle_start + rel,
            SpanEncoding::Base64 => self.bundle_start + (rel / 3) * 4,
        })
    }

    /// Artifact offset of an output offset, if the span covers it.
    pub fn to_artifact(&self, bundle_offset: u64) -> Option<u64> {
        if !self.contains_bundle(bundle_offset) {
            return None;
        }
        let rel = bundle_offset - self.bundle_start;
        Some(match self.encoding {
            SpanEncoding::Raw => self.artifact_start + rel,
            SpanEncoding::Base64 => self.artifact_start + (rel / 4) * 3,
        })
    }
}

/// Re-express an artifact map in output offsets.
///
/// Each artifact mapping is carried through every span that covers it, so
/// an output offset resolves transitively to the original source position.
pub fn compose(artifact: &DebugMap, embeddings: &[Embedding]) -> DebugMap {
    let mut out = DebugMap::new();
    let ids: Vec<u32> = artifact
        .sources()
        .iter()
        .enumerate()
        .map(|(i, name)| out.add_source(name, artifact.source_content(i as u32)))
        .collect();

    for span in embeddings {
        for mapping in artifact.mappings() {
            let Some(&source) = ids.get(mapping.source as usize) else {
                continue;
            };
            if let Some(generated) = span.to_bundle(mapping.generated) {
                out.add_mapping(Mapping {
                    generated,
                    source,
                    line: mapping.line,
                    column: mapping.column,
                });
            }
        }
    }

    out
}

/// Result of merging; the diagnostic is set when the artifact map was
/// unusable and the merge degraded to the output's own map.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub map: Option<DebugMap>,
    pub diagnostic: Option<String>,
}

/// Merge the output's own map with the artifact map carried through
/// `embeddings`.
///
/// When `wants_source_map` is false, or there is no artifact map, the
/// output's map passes through untouched. A malformed artifact map is not
/// fatal: the output's map is kept and the error is returned as a diagnostic.
pub fn merge(
    bundle: Option<DebugMap>,
    artifact_map: Option<&[u8]>,
    embeddings: &[Embedding],
    wants_source_map: bool,
) -> MergeOutcome {
    if !wants_source_map {
        return MergeOutcome {
            map: bundle,
            diagnostic: None,
        };
    }
    let Some(raw) = artifact_map else {
        return MergeOutcome {
            map: bundle,
            diagnostic: None,
        };
    };

    let parsed = std::str::from_utf8(raw)
        .map_err(|e| crate::Error::MalformedDebugMap(e.to_string()))
        .and_then(DebugMap::from_artifact_json);

    let artifact = match parsed {
        Ok(map) => map,
        Err(err) => {
            tracing::warn!(error = %err, "skipping debug map merge");
            return MergeOutcome {
                map: bundle,
                diagnostic: Some(err.to_string()),
            };
        }
    };

    let composed = compose(&artifact, embeddings);
    let Some(bundle) = bundle else {
        return MergeOutcome {
            map: Some(composed),
            diagnostic: None,
        };
    };

    let mut merged = DebugMap::new();
    let bundle_ids: Vec<u32> = bundle
        .sources()
        .iter()
        .enumerate()
        .map(|(i, name)| merged.add_source(name, bundle.source_content(i as u32)))
        .collect();

    // The output's own mappings inside embedded spans describe the encoded
    // bytes, not code; the composed mappings replace them there.
    for mapping in bundle.mappings() {
        if embeddings.iter().any(|e| e.contains_bundle(mapping.generated)) {
            continue;
        }
        if let Some(&source) = bundle_ids.get(mapping.source as usize) {
            merged.add_mapping(Mapping { source, ..*mapping });
        }
    }

    let composed_ids: Vec<u32> = composed
        .sources()
        .iter()
        .enumerate()
        .map(|(i, name)| merged.add_source(name, composed.source_content(i as u32)))
        .collect();
    for mapping in composed.mappings() {
        if let Some(&source) = composed_ids.get(mapping.source as usize) {
            merged.add_mapping(Mapping { source, ..*mapping });
        }
    }

    MergeOutcome {
        map: Some(merged),
        diagnostic: None,
    }
}
