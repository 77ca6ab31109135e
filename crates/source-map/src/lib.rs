//! Source position tracking and mapping for sfc-setup.
//!
//! This crate provides utilities for tracking byte spans in a component
//! document, recording offset mappings while generating code, composing
//! two mappings into one, and encoding the result as a V3 source map.

pub mod v3;

use std::ops::Range;
pub use v3::SourceMapV3;

/// A span in the source code, representing a half-open range [start, end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start offset (inclusive)
    pub start: u32,
    /// End offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Create a new span from start and end offsets.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Create an empty span at the given offset.
    #[inline]
    pub const fn empty(offset: u32) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Get the length of the span.
    #[inline]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Check if the span is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span contains an offset.
    #[inline]
    pub const fn contains_offset(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Merge two spans into one that covers both.
    #[inline]
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Move both ends of the span forward by `delta`.
    #[inline]
    pub const fn shift(self, delta: u32) -> Span {
        Span {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Convert to a Range<usize>.
    #[inline]
    pub fn to_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// A line index for converting between byte offsets and line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of the start of each line.
    line_starts: Vec<u32>,
    /// Total length of the source.
    len: u32,
}

impl LineIndex {
    /// Create a new line index from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            line_starts,
            len: text.len() as u32,
        }
    }

    /// Get the line and column for a byte offset.
    /// Line and column are 0-indexed; offsets past the end clamp to it.
    pub fn line_col(&self, offset: u32) -> LineCol {
        let offset = offset.min(self.len);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line];
        let col = offset - line_start;
        LineCol {
            line: line as u32,
            col,
        }
    }

    /// Like [`LineIndex::line_col`], but the column counts UTF-16 code units
    /// as required by V3 source maps. `text` must be the indexed text.
    pub fn line_col_utf16(&self, text: &str, offset: u32) -> LineCol {
        let byte_pos = self.line_col(offset);
        let line_start = self.line_starts[byte_pos.line as usize] as usize;
        match text.get(line_start..offset as usize) {
            Some(prefix) => LineCol::new(byte_pos.line, prefix.encode_utf16().count() as u32),
            None => byte_pos,
        }
    }

    /// Get the start offset of a line.
    pub fn line_start(&self, line: u32) -> Option<u32> {
        self.line_starts.get(line as usize).copied()
    }
}

/// A line and column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct LineCol {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed column.
    pub col: u32,
}

impl LineCol {
    /// Create a new line/column position.
    #[inline]
    pub const fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }

    /// Convert to 1-indexed for display.
    #[inline]
    pub const fn to_display(self) -> (u32, u32) {
        (self.line + 1, self.col + 1)
    }
}

/// A mapping from generated code back to original source.
///
/// When both lengths are equal the generated range is a verbatim copy of
/// the source range and every offset inside it maps one-to-one. Otherwise
/// the mapping only anchors the start of the generated range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    /// Offset in the generated code.
    pub generated_offset: u32,
    /// Length in the generated code.
    pub generated_length: u32,
    /// Offset in the original source.
    pub source_offset: u32,
    /// Length in the original source.
    pub source_length: u32,
}

impl SourceMapping {
    /// Create a new source mapping with equal lengths.
    pub fn new(generated_offset: u32, source_offset: u32, length: u32) -> Self {
        Self {
            generated_offset,
            generated_length: length,
            source_offset,
            source_length: length,
        }
    }

    /// Create a mapping with different generated and source lengths.
    pub fn new_with_lengths(
        generated_offset: u32,
        generated_length: u32,
        source_offset: u32,
        source_length: u32,
    ) -> Self {
        Self {
            generated_offset,
            generated_length,
            source_offset,
            source_length,
        }
    }

    /// Whether the generated range is a verbatim copy of the source range.
    pub fn is_verbatim(&self) -> bool {
        self.generated_length == self.source_length
    }

    /// Get the generated span.
    pub fn generated_span(&self) -> Span {
        Span::new(
            self.generated_offset,
            self.generated_offset + self.generated_length,
        )
    }

    /// Get the source span.
    pub fn source_span(&self) -> Span {
        Span::new(self.source_offset, self.source_offset + self.source_length)
    }

    /// Translate a generated offset inside this mapping to a source offset.
    fn translate(&self, generated_offset: u32) -> u32 {
        if self.is_verbatim() {
            self.source_offset + (generated_offset - self.generated_offset)
        } else {
            self.source_offset
        }
    }
}

/// A source map containing multiple mappings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    /// All mappings, sorted by generated offset.
    mappings: Vec<SourceMapping>,
}

impl SourceMap {
    /// Create a new empty source map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping to the source map.
    pub fn add_mapping(&mut self, mapping: SourceMapping) {
        // Insert in sorted order by generated offset
        let pos = self
            .mappings
            .partition_point(|m| m.generated_offset <= mapping.generated_offset);
        self.mappings.insert(pos, mapping);
    }

    /// Add a simple mapping with equal lengths.
    pub fn add(&mut self, generated_offset: u32, source_offset: u32, length: u32) {
        self.add_mapping(SourceMapping::new(generated_offset, source_offset, length));
    }

    /// Find the mapping covering a generated offset.
    pub fn find_source(&self, generated_offset: u32) -> Option<&SourceMapping> {
        let idx = self
            .mappings
            .partition_point(|m| m.generated_offset <= generated_offset);
        self.mappings[..idx]
            .iter()
            .rev()
            .find(|m| m.generated_span().contains_offset(generated_offset))
    }

    /// Map a generated offset to a source offset.
    pub fn to_source_offset(&self, generated_offset: u32) -> Option<u32> {
        self.find_source(generated_offset)
            .map(|m| m.translate(generated_offset))
    }

    /// Get all mappings.
    pub fn mappings(&self) -> &[SourceMapping] {
        &self.mappings
    }

    /// Check if the source map is empty.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Get the number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Merge another source map into this one.
    pub fn merge(&mut self, other: &SourceMap) {
        for mapping in &other.mappings {
            self.add_mapping(mapping.clone());
        }
    }

    /// Return a copy with every generated offset moved forward by `delta`.
    pub fn shift_generated(&self, delta: u32) -> SourceMap {
        SourceMap {
            mappings: self
                .mappings
                .iter()
                .map(|m| SourceMapping {
                    generated_offset: m.generated_offset + delta,
                    ..m.clone()
                })
                .collect(),
        }
    }

    /// Return a copy with every source offset moved forward by `delta`.
    pub fn shift_source(&self, delta: u32) -> SourceMap {
        SourceMap {
            mappings: self
                .mappings
                .iter()
                .map(|m| SourceMapping {
                    source_offset: m.source_offset + delta,
                    ..m.clone()
                })
                .collect(),
        }
    }

    /// Compose two maps.
    ///
    /// `self` maps generated offsets to an intermediate coordinate space and
    /// `inner` maps that intermediate space to the original source. The
    /// result maps generated offsets straight to the original source.
    /// Intermediate ranges that `inner` does not cover are dropped.
    pub fn compose(&self, inner: &SourceMap) -> SourceMap {
        let mut composed = SourceMap::new();

        for outer in &self.mappings {
            let mid = outer.source_span();

            if mid.is_empty() {
                if let Some(target) = inner.find_source(mid.start) {
                    composed.add_mapping(SourceMapping::new_with_lengths(
                        outer.generated_offset,
                        outer.generated_length,
                        target.translate(mid.start),
                        0,
                    ));
                }
                continue;
            }

            for target in inner.overlapping(mid) {
                let target_span = target.generated_span();
                let start = mid.start.max(target_span.start);
                let end = mid.end.min(target_span.end);

                if outer.is_verbatim() {
                    let generated_offset = outer.generated_offset + (start - mid.start);
                    let source_offset = target.translate(start);
                    let mapping = if target.is_verbatim() {
                        SourceMapping::new(generated_offset, source_offset, end - start)
                    } else {
                        SourceMapping::new_with_lengths(
                            generated_offset,
                            end - start,
                            source_offset,
                            target.source_length,
                        )
                    };
                    composed.add_mapping(mapping);
                } else {
                    composed.add_mapping(SourceMapping::new_with_lengths(
                        outer.generated_offset,
                        outer.generated_length,
                        target.translate(start),
                        target.source_length,
                    ));
                    break;
                }
            }
        }

        composed
    }

    /// Mappings whose generated range intersects `span`.
    fn overlapping(&self, span: Span) -> impl Iterator<Item = &SourceMapping> {
        self.mappings.iter().filter(move |m| {
            m.generated_length > 0
                && m.generated_offset < span.end
                && span.start < m.generated_offset + m.generated_length
        })
    }
}

/// Builder for generating code with source mappings.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    /// The generated code.
    code: String,
    /// The source map.
    source_map: SourceMap,
}

impl CodeBuilder {
    /// Create a new code builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current offset in the generated code.
    pub fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    /// Append code without mapping.
    pub fn push_str(&mut self, code: &str) {
        self.code.push_str(code);
    }

    /// Append a character without mapping.
    pub fn push(&mut self, c: char) {
        self.code.push(c);
    }

    /// Append code with a mapping to the source.
    pub fn push_mapped(&mut self, code: &str, source_offset: u32) {
        let generated_offset = self.offset();
        let len = code.len() as u32;
        self.code.push_str(code);
        if len > 0 {
            self.source_map.add(generated_offset, source_offset, len);
        }
    }

    /// Append code with a custom mapping.
    pub fn push_with_mapping(&mut self, code: &str, source_offset: u32, source_length: u32) {
        let generated_offset = self.offset();
        let generated_length = code.len() as u32;
        self.code.push_str(code);
        if generated_length > 0 || source_length > 0 {
            self.source_map.add_mapping(SourceMapping::new_with_lengths(
                generated_offset,
                generated_length,
                source_offset,
                source_length,
            ));
        }
    }

    /// Append code that already carries its own mappings (relative to the
    /// start of `code`).
    pub fn append(&mut self, code: &str, map: &SourceMap) {
        let delta = self.offset();
        self.code.push_str(code);
        self.source_map.merge(&map.shift_generated(delta));
    }

    /// Append a newline.
    pub fn newline(&mut self) {
        self.code.push('\n');
    }

    /// Get the generated code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Get the source map.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Consume the builder and return the code and source map.
    pub fn finish(self) -> (String, SourceMap) {
        (self.code, self.source_map)
    }
}
