//! Debug maps between original sources and generated byte offsets.
//!
//! Maps are read and written as Source Map v3 JSON through `oxc_sourcemap`.
//! Artifact maps follow the WebAssembly convention: a single generated line
//! whose column is the byte offset into the module. Text maps (glue modules,
//! bundles) are converted to byte offsets with a [`LineIndex`].

mod merge;

pub use merge::{Embedding, MergeOutcome, SpanEncoding, compose, merge};

use oxc_sourcemap::{SourceMap, SourceMapBuilder};

use crate::error::{Error, Result};

/// One generated offset pointing back at a source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    /// Byte offset in the generated output.
    pub generated: u64,
    /// Index into [`DebugMap::sources`].
    pub source: u32,
    /// Zero-based source line.
    pub line: u32,
    /// Zero-based source column.
    pub column: u32,
}

/// A resolved original position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition<'a> {
    pub source: &'a str,
    pub line: u32,
    pub column: u32,
}

/// Offset-keyed debug map, sorted by generated offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugMap {
    sources: Vec<String>,
    contents: Vec<Option<String>>,
    mappings: Vec<Mapping>,
}

impl DebugMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source, returning its index. Re-adding a name returns the
    /// existing index.
    pub fn add_source(&mut self, name: &str, content: Option<&str>) -> u32 {
        if let Some(index) = self.sources.iter().position(|s| s == name) {
            if self.contents[index].is_none() {
                self.contents[index] = content.map(str::to_string);
            }
            return index as u32;
        }
        self.sources.push(name.to_string());
        self.contents.push(content.map(str::to_string));
        (self.sources.len() - 1) as u32
    }

    /// Insert a mapping, keeping the list ordered by generated offset.
    ///
    /// Returns `false` and drops the mapping when its source index was never
    /// registered with [`DebugMap::add_source`].
    pub fn add_mapping(&mut self, mapping: Mapping) -> bool {
        if mapping.source as usize >= self.sources.len() {
            tracing::debug!(source = mapping.source, "dropping mapping with unknown source");
            return false;
        }
        let at = self
            .mappings
            .partition_point(|m| m.generated <= mapping.generated);
        self.mappings.insert(at, mapping);
        true
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn source_content(&self, index: u32) -> Option<&str> {
        self.contents.get(index as usize)?.as_deref()
    }

    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Original position for a generated offset: the closest mapping at or
    /// before `offset`.
    pub fn resolve(&self, offset: u64) -> Option<SourcePosition<'_>> {
        let idx = self.mappings.partition_point(|m| m.generated <= offset);
        let mapping = self.mappings.get(idx.checked_sub(1)?)?;
        Some(SourcePosition {
            source: self.sources.get(mapping.source as usize)?,
            line: mapping.line,
            column: mapping.column,
        })
    }

    /// Parse an artifact's map (generated column = byte offset on line 0).
    pub fn from_artifact_json(json: &str) -> Result<Self> {
        let map = parse_json(json)?;
        Self::from_sourcemap(&map, |line, col| {
            if line == 0 {
                Ok(u64::from(col))
            } else {
                Err(Error::MalformedDebugMap(format!(
                    "artifact map has a mapping on generated line {line}"
                )))
            }
        })
    }

    /// Parse a text map, converting line/column positions within `text`.
    pub fn from_text_json(json: &str, text: &str) -> Result<Self> {
        let map = parse_json(json)?;
        let index = LineIndex::new(text);
        Self::from_sourcemap(&map, |line, col| {
            index.offset(line, col).ok_or_else(|| {
                Error::MalformedDebugMap(format!(
                    "mapping at {line}:{col} lies outside the generated text"
                ))
            })
        })
    }

    fn from_sourcemap(
        map: &SourceMap,
        mut generated: impl FnMut(u32, u32) -> Result<u64>,
    ) -> Result<Self> {
        let mut out = DebugMap::new();
        let ids: Vec<u32> = map
            .get_sources()
            .map(|source| {
                let name = source.to_string();
                out.add_source(&name, None)
            })
            .collect();

        for token in map.get_tokens() {
            let Some(source_id) = token.get_source_id() else {
                continue;
            };
            let source = *ids.get(source_id as usize).ok_or_else(|| {
                Error::MalformedDebugMap(format!("source index {source_id} out of range"))
            })?;
            out.add_mapping(Mapping {
                generated: generated(token.get_dst_line(), token.get_dst_col())?,
                source,
                line: token.get_src_line(),
                column: token.get_src_col(),
            });
        }

        Ok(out)
    }

    /// Build a Source Map v3 for `text`, whose byte offsets this map uses.
    pub fn to_sourcemap(&self, text: &str) -> SourceMap {
        let index = LineIndex::new(text);
        let mut builder = SourceMapBuilder::default();
        let ids: Vec<u32> = self
            .sources
            .iter()
            .zip(&self.contents)
            .map(|(name, content)| builder.add_source_and_content(name, content.as_deref().unwrap_or("")))
            .collect();

        for m in &self.mappings {
            let (line, col) = index.position(m.generated);
            let source = ids.get(m.source as usize).copied();
            builder.add_token(line, col, m.line, m.column, source, None);
        }

        builder.into_sourcemap()
    }

    /// Serialize as Source Map v3 JSON for `text`.
    pub fn to_json(&self, text: &str) -> String {
        self.to_sourcemap(text).to_json_string()
    }

    /// Serialize in the artifact convention, with every offset on line 0.
    pub fn to_artifact_json(&self) -> String {
        self.to_json("")
    }
}

fn parse_json(json: &str) -> Result<SourceMap> {
    SourceMap::from_json_string(json).map_err(|e| Error::MalformedDebugMap(e.to_string()))
}

/// Byte offset ↔ line/column conversion for generated text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u64>,
    len: u64,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u64 + 1),
        );
        Self {
            line_starts,
            len: text.len() as u64,
        }
    }

    /// Zero-based line and byte column of `offset`.
    pub fn position(&self, offset: u64) -> (u32, u32) {
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let col = offset - self.line_starts[line];
        (line as u32, col as u32)
    }

    /// Byte offset of a line/column, if it lies within the text.
    pub fn offset(&self, line: u32, col: u32) -> Option<u64> {
        let start = *self.line_starts.get(line as usize)?;
        let offset = start + u64::from(col);
        (offset <= self.len).then_some(offset)
    }
}
