//! Component document parser.
//!
//! This crate segments a component document into its template,
//! `<script>` and `<script setup>` parts, parses the script segments with
//! swc, and analyzes which identifiers the setup scope declares and the
//! template uses.

pub mod ast;
pub mod error;
pub mod identifiers;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod tags;

pub use ast::*;
pub use error::{ErrorCode, ParseError, ParseResult};
pub use parser::{decode_entities, parse_document};
pub use script::{parse_scripts, ParsedScript, ParsedScripts};

/// Segment a component document.
pub fn parse(source: &str) -> ParseResult<Document> {
    parse_document(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_document() {
        let source = r#"<template>
  <div>Hello {{ name }}</div>
</template>

<script setup lang="ts">
const name = ref('World')
</script>

<style scoped>
div { color: red; }
</style>
"#;
        let result = parse(source).unwrap();
        assert!(result.template.is_some());
        assert!(result.script_setup.is_some());
        assert!(result.script.is_none());
        assert!(result.template.unwrap().identifiers.contains("name"));
    }

    #[test]
    fn test_parse_script_only() {
        let source = r#"<script lang="ts">
export default {
  name: 'MyComponent'
}
</script>
"#;
        let result = parse(source).unwrap();
        assert!(result.template.is_none());
        assert!(result.script.is_some());
        assert!(result.script_setup.is_none());
    }

    #[test]
    fn test_style_markup_is_not_template() {
        let source = "<style>\n.a::after { content: '<template>' }\n</style>";
        let result = parse(source).unwrap();
        assert!(result.is_empty());
    }
}
