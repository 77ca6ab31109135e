//! Segment types for component documents.

use indexmap::IndexSet;
use smol_str::SmolStr;
use source_map::Span;

/// A segmented component document.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The full source content.
    pub source: String,
    /// The template segment, if present.
    pub template: Option<TemplateSegment>,
    /// The module-scope `<script>` segment, if present.
    pub script: Option<ScriptSegment>,
    /// The setup-scope `<script setup>` segment, if present.
    pub script_setup: Option<ScriptSegment>,
}

impl Document {
    /// Create a new empty document.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// The dialect shared by both script segments. Documents without any
    /// script default to plain JavaScript.
    pub fn script_lang(&self) -> ScriptLang {
        self.script_setup
            .as_ref()
            .or(self.script.as_ref())
            .map(|s| s.lang)
            .unwrap_or_default()
    }

    /// Whether any segment carries compilable content.
    pub fn is_empty(&self) -> bool {
        self.template.is_none() && self.script.is_none() && self.script_setup.is_none()
    }
}

/// A block in the document with common properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// The span of the entire block including tags.
    pub span: Span,
    /// The span of the content only (excluding tags).
    pub content_span: Span,
    /// The raw content of the block.
    pub content: String,
    /// Block attributes.
    pub attrs: Vec<Attr>,
}

impl Segment {
    pub fn start(&self) -> u32 {
        self.span.start
    }

    pub fn end(&self) -> u32 {
        self.span.end
    }

    pub fn content_start(&self) -> u32 {
        self.content_span.start
    }

    pub fn content_end(&self) -> u32 {
        self.content_span.end
    }

    /// Get an attribute value by name.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// Check if an attribute exists (for boolean attributes).
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }
}

/// An attribute on a block tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The attribute name.
    pub name: SmolStr,
    /// The attribute value (None for boolean attributes).
    pub value: Option<String>,
    /// The span of the attribute.
    pub span: Span,
    /// The span of the value (if present).
    pub value_span: Option<Span>,
}

/// The template segment and the metadata collected while scanning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSegment {
    pub segment: Segment,
    /// Candidate component identifiers (`my-button` -> `MyButton`).
    pub components: IndexSet<String>,
    /// Raw text of every binding expression, `v-for` aliases stripped.
    pub expressions: IndexSet<String>,
    /// Identifiers referenced through `ref` attributes and expressions.
    pub identifiers: IndexSet<String>,
}

impl TemplateSegment {
    /// `<template functional>`
    pub fn is_functional(&self) -> bool {
        self.has_attr("functional")
    }

    /// `<template condense>` selects condensed whitespace handling.
    pub fn is_condensed(&self) -> bool {
        self.has_attr("condense")
    }
}

impl std::ops::Deref for TemplateSegment {
    type Target = Segment;
    fn deref(&self) -> &Self::Target {
        &self.segment
    }
}

/// A `<script>` or `<script setup>` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSegment {
    pub segment: Segment,
    /// The normalized script language.
    pub lang: ScriptLang,
    /// Whether this is `<script setup>`.
    pub setup: bool,
}

impl std::ops::Deref for ScriptSegment {
    type Target = Segment;
    fn deref(&self) -> &Self::Target {
        &self.segment
    }
}

/// Script language variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScriptLang {
    /// JavaScript
    #[default]
    Js,
    /// JavaScript with JSX
    Jsx,
    /// TypeScript
    Ts,
    /// TypeScript with JSX
    Tsx,
}

impl ScriptLang {
    /// Parse from a `lang` attribute value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "js" => Some(Self::Js),
            "jsx" => Some(Self::Jsx),
            "ts" => Some(Self::Ts),
            "tsx" => Some(Self::Tsx),
            _ => None,
        }
    }

    /// Get the file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Js => "js",
            Self::Jsx => "jsx",
            Self::Ts => "ts",
            Self::Tsx => "tsx",
        }
    }

    /// Check if this is TypeScript.
    pub fn is_typescript(&self) -> bool {
        matches!(self, Self::Ts | Self::Tsx)
    }

    /// Check if this supports JSX.
    pub fn is_jsx(&self) -> bool {
        matches!(self, Self::Jsx | Self::Tsx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_lang_parse() {
        assert_eq!(ScriptLang::parse("ts"), Some(ScriptLang::Ts));
        assert_eq!(ScriptLang::parse("tsx"), Some(ScriptLang::Tsx));
        assert_eq!(ScriptLang::parse("coffee"), None);
        assert!(ScriptLang::Tsx.is_typescript() && ScriptLang::Tsx.is_jsx());
        assert!(!ScriptLang::Js.is_typescript());
    }

    #[test]
    fn test_document_script_lang_defaults_to_js() {
        assert_eq!(Document::new("").script_lang(), ScriptLang::Js);
    }
}
