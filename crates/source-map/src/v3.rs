//! Version 3 source map encoding.

use serde::{Deserialize, Serialize};

use crate::{LineCol, LineIndex, SourceMap};

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// A V3 source map as serialized to `.map` files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapV3 {
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources_content: Vec<String>,
    pub names: Vec<String>,
    pub mappings: String,
}

/// One decoded mapping segment with absolute, zero-based positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Segment {
    pub generated: LineCol,
    pub source_index: u32,
    pub original: LineCol,
}

impl SourceMapV3 {
    /// Encode `map`, whose offsets are byte offsets into `generated` and
    /// `source`, as a V3 map pointing at a single source file.
    pub fn from_source_map(
        map: &SourceMap,
        generated: &str,
        source: &str,
        source_name: &str,
        file: Option<&str>,
    ) -> Self {
        let generated_index = LineIndex::new(generated);
        let source_index = LineIndex::new(source);

        let mut segments = Vec::new();
        for mapping in map.mappings() {
            let gen_start = mapping.generated_offset;
            let src_start = mapping.source_offset;
            if gen_start as usize > generated.len() || src_start as usize > source.len() {
                continue;
            }

            segments.push(Segment {
                generated: generated_index.line_col_utf16(generated, gen_start),
                source_index: 0,
                original: source_index.line_col_utf16(source, src_start),
            });

            // Verbatim chunks spanning lines need a segment on each line
            if mapping.is_verbatim() {
                let start_line = generated_index.line_col(gen_start).line;
                let gen_end = (gen_start + mapping.generated_length).min(generated.len() as u32);
                let end_line = generated_index.line_col(gen_end).line;
                for line in start_line + 1..=end_line {
                    let Some(line_offset) = generated_index.line_start(line) else {
                        break;
                    };
                    if line_offset >= gen_end {
                        break;
                    }
                    let src_offset = src_start + (line_offset - gen_start);
                    if src_offset as usize > source.len() {
                        break;
                    }
                    segments.push(Segment {
                        generated: LineCol::new(line, 0),
                        source_index: 0,
                        original: source_index.line_col_utf16(source, src_offset),
                    });
                }
            }
        }

        segments.sort();
        segments.dedup_by_key(|segment| segment.generated);

        Self {
            version: 3,
            file: file.map(str::to_owned),
            sources: vec![source_name.to_owned()],
            sources_content: vec![source.to_owned()],
            names: Vec::new(),
            mappings: encode_mappings(&segments),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Decode the `mappings` field into absolute segments.
    pub fn segments(&self) -> Option<Vec<Segment>> {
        decode_mappings(&self.mappings)
    }
}

/// Encode sorted segments into the `mappings` string.
pub fn encode_mappings(segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut line = 0;
    let mut prev_col = 0i64;
    let mut prev_source = 0i64;
    let mut prev_orig_line = 0i64;
    let mut prev_orig_col = 0i64;
    let mut first_in_line = true;

    for segment in segments {
        while line < segment.generated.line {
            out.push(';');
            line += 1;
            prev_col = 0;
            first_in_line = true;
        }
        if !first_in_line {
            out.push(',');
        }
        first_in_line = false;

        let col = i64::from(segment.generated.col);
        let source = i64::from(segment.source_index);
        let orig_line = i64::from(segment.original.line);
        let orig_col = i64::from(segment.original.col);

        encode_vlq(&mut out, col - prev_col);
        encode_vlq(&mut out, source - prev_source);
        encode_vlq(&mut out, orig_line - prev_orig_line);
        encode_vlq(&mut out, orig_col - prev_orig_col);

        prev_col = col;
        prev_source = source;
        prev_orig_line = orig_line;
        prev_orig_col = orig_col;
    }

    out
}

/// Decode a `mappings` string. Segments with only a generated column are
/// skipped. Returns `None` on malformed input.
pub fn decode_mappings(mappings: &str) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut prev_source = 0i64;
    let mut prev_orig_line = 0i64;
    let mut prev_orig_col = 0i64;

    for (line, group) in mappings.split(';').enumerate() {
        let mut prev_col = 0i64;
        for raw in group.split(',').filter(|s| !s.is_empty()) {
            let fields = decode_vlq(raw)?;
            prev_col += *fields.first()?;
            if fields.len() < 4 {
                continue;
            }
            prev_source += fields[1];
            prev_orig_line += fields[2];
            prev_orig_col += fields[3];
            segments.push(Segment {
                generated: LineCol::new(line as u32, u32::try_from(prev_col).ok()?),
                source_index: u32::try_from(prev_source).ok()?,
                original: LineCol::new(
                    u32::try_from(prev_orig_line).ok()?,
                    u32::try_from(prev_orig_col).ok()?,
                ),
            });
        }
    }

    Some(segments)
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };
    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq > 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

fn decode_vlq(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    let mut value = 0i64;
    let mut shift = 0;

    for byte in segment.bytes() {
        let digit = BASE64.iter().position(|&b| b == byte)? as i64;
        value += (digit & 0b11111) << shift;
        if digit & 0b100000 != 0 {
            shift += 5;
        } else {
            let negative = value & 1 == 1;
            value >>= 1;
            values.push(if negative { -value } else { value });
            value = 0;
            shift = 0;
        }
    }

    if shift != 0 {
        return None;
    }
    Some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vlq_known_values() {
        let mut out = String::new();
        encode_vlq(&mut out, 0);
        encode_vlq(&mut out, 1);
        encode_vlq(&mut out, -1);
        encode_vlq(&mut out, 16);
        assert_eq!(out, "ACDgB");
        assert_eq!(decode_vlq("ACDgB"), Some(vec![0, 1, -1, 16]));
    }

    #[test]
    fn test_decode_rejects_truncated_segment() {
        assert_eq!(decode_vlq("g"), None);
        assert_eq!(decode_mappings("A!AA"), None);
    }

    #[test]
    fn test_from_source_map_multiline_copy() {
        let source = "<script>\nconst a = 1\nconst b = 2\n</script>";
        let generated = "// out\nconst a = 1\nconst b = 2\n";
        let mut map = SourceMap::new();
        // "const a = 1\nconst b = 2" copied verbatim
        map.add(7, 9, 23);

        let v3 = SourceMapV3::from_source_map(&map, generated, source, "App.vue", None);
        assert_eq!(v3.version, 3);
        assert_eq!(v3.sources, vec!["App.vue".to_owned()]);

        let segments = v3.segments().unwrap();
        assert_eq!(
            segments,
            vec![
                Segment {
                    generated: LineCol::new(1, 0),
                    source_index: 0,
                    original: LineCol::new(1, 0),
                },
                Segment {
                    generated: LineCol::new(2, 0),
                    source_index: 0,
                    original: LineCol::new(2, 0),
                },
            ]
        );
    }

    #[test]
    fn test_json_shape() {
        let v3 = SourceMapV3::from_source_map(&SourceMap::new(), "", "x", "a.vue", Some("a.vue.js"));
        let json = v3.to_json().unwrap();
        assert!(json.contains("\"sourcesContent\":[\"x\"]"));
        assert!(json.contains("\"file\":\"a.vue.js\""));
        assert_eq!(SourceMapV3::from_json(&json).unwrap(), v3);
    }
}
