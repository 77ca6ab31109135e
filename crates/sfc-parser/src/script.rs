//! Script segment parsing.
//!
//! Each script segment is loaded into a shared per-compile
//! [`swc_common::SourceMap`] as its own source file. The byte positions swc
//! assigns to those files are what later stages use to slice original text
//! and to map generated code back into the document.

use crate::ast::{Document, ScriptLang, ScriptSegment};
use crate::error::{ParseError, ParseResult};
use source_map::Span;
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceFile, SourceMap, Spanned};
use swc_ecma_ast::{EsVersion, Expr, Module, ModuleItem};
use swc_ecma_parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax, TsSyntax};

/// A parsed script segment.
pub struct ParsedScript {
    /// The syntax tree.
    pub module: Module,
    /// The source file holding the segment content.
    pub file: Lrc<SourceFile>,
    /// Document offset of the first content byte.
    pub content_start: u32,
}

impl ParsedScript {
    /// Top-level items.
    pub fn items(&self) -> &[ModuleItem] {
        &self.module.body
    }

    /// Whether `span` lies inside this segment's source file.
    pub fn contains(&self, span: swc_common::Span) -> bool {
        self.file.start_pos <= span.lo && span.hi <= self.file.end_pos
    }

    /// Segment-local byte range of an swc span.
    pub fn local_span(&self, span: swc_common::Span) -> Span {
        let base = self.file.start_pos.0;
        Span::new(
            span.lo.0.saturating_sub(base),
            span.hi.0.saturating_sub(base),
        )
    }

    /// Document-relative byte range of an swc span.
    pub fn document_span(&self, span: swc_common::Span) -> Span {
        self.local_span(span).shift(self.content_start)
    }

    /// The original text covered by an swc span.
    pub fn text(&self, span: swc_common::Span) -> &str {
        let src: &str = &self.file.src;
        src.get(self.local_span(span).to_range()).unwrap_or_default()
    }

    /// The whole segment text.
    pub fn source(&self) -> &str {
        &self.file.src
    }
}

/// Both script segments of a document, parsed with a common dialect.
/// Absent segments parse as empty modules.
pub struct ParsedScripts {
    pub lang: ScriptLang,
    pub script: ParsedScript,
    pub script_setup: ParsedScript,
}

/// Parser options derived from a script language.
pub fn syntax_for(lang: ScriptLang) -> Syntax {
    match lang {
        ScriptLang::Js | ScriptLang::Jsx => Syntax::Es(EsSyntax {
            jsx: lang.is_jsx(),
            ..Default::default()
        }),
        ScriptLang::Ts | ScriptLang::Tsx => Syntax::Typescript(TsSyntax {
            tsx: lang.is_jsx(),
            ..Default::default()
        }),
    }
}

/// Parse both script segments of `document` into `cm`.
pub fn parse_scripts(
    cm: &Lrc<SourceMap>,
    document: &Document,
    file_name: &str,
) -> ParseResult<ParsedScripts> {
    let lang = document.script_lang();
    let script = parse_segment(cm, document.script.as_ref(), file_name, "script", lang)?;
    let script_setup = parse_segment(
        cm,
        document.script_setup.as_ref(),
        file_name,
        "script-setup",
        lang,
    )?;
    Ok(ParsedScripts {
        lang,
        script,
        script_setup,
    })
}

fn parse_segment(
    cm: &Lrc<SourceMap>,
    segment: Option<&ScriptSegment>,
    file_name: &str,
    kind: &str,
    lang: ScriptLang,
) -> ParseResult<ParsedScript> {
    let (content, content_start) = match segment {
        Some(segment) => (segment.content.as_str(), segment.content_start()),
        None => ("", 0),
    };
    parse_script(
        cm,
        &format!("{}?{}", file_name, kind),
        content,
        content_start,
        lang,
    )
}

/// Parse a script text that starts at `content_start` in the document.
pub fn parse_script(
    cm: &Lrc<SourceMap>,
    name: &str,
    content: &str,
    content_start: u32,
    lang: ScriptLang,
) -> ParseResult<ParsedScript> {
    let file = cm.new_source_file(FileName::Custom(name.to_owned()).into(), content.to_owned());
    let lexer = Lexer::new(
        syntax_for(lang),
        EsVersion::latest(),
        StringInput::from(&*file),
        None,
    );
    let mut parser = Parser::new_from(lexer);

    let to_error = |err: swc_ecma_parser::error::Error| {
        let base = file.start_pos.0;
        let span = err.span();
        ParseError::script_syntax(
            err.kind().msg(),
            Span::new(
                span.lo.0.saturating_sub(base) + content_start,
                span.hi.0.saturating_sub(base) + content_start,
            ),
        )
    };

    let module = parser.parse_module().map_err(to_error)?;
    if let Some(err) = parser.take_errors().into_iter().next() {
        return Err(to_error(err));
    }

    tracing::trace!(name, items = module.body.len(), "parsed script segment");

    Ok(ParsedScript {
        module,
        file,
        content_start,
    })
}

fn detached_parser(source: &str) -> (Lrc<SourceMap>, Lrc<SourceFile>) {
    let cm: Lrc<SourceMap> = Default::default();
    let file = cm.new_source_file(FileName::Anon.into(), source.to_owned());
    (cm, file)
}

/// Parse a standalone template expression. `None` if it is not a single
/// well-formed expression.
pub fn parse_expression(source: &str) -> Option<Box<Expr>> {
    let (_cm, file) = detached_parser(&format!("({})", source));
    let lexer = Lexer::new(
        syntax_for(ScriptLang::Js),
        EsVersion::latest(),
        StringInput::from(&*file),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let expr = parser.parse_expr().ok()?;
    if !parser.take_errors().is_empty() {
        return None;
    }
    Some(expr)
}

/// Parse a standalone statement list as a module body.
pub fn parse_statements(source: &str) -> Option<Vec<ModuleItem>> {
    let (_cm, file) = detached_parser(source);
    let lexer = Lexer::new(
        syntax_for(ScriptLang::Js),
        EsVersion::latest(),
        StringInput::from(&*file),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let module = parser.parse_module().ok()?;
    if !parser.take_errors().is_empty() {
        return None;
    }
    Some(module.body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn test_parse_scripts_tracks_document_offsets() {
        let source = "<script setup lang=\"ts\">\nconst msg: string = 'hi'\n</script>";
        let document = parse_document(source).unwrap();
        let cm: Lrc<SourceMap> = Default::default();
        let parsed = parse_scripts(&cm, &document, "App.vue").unwrap();

        assert_eq!(parsed.lang, ScriptLang::Ts);
        assert!(parsed.script.items().is_empty());
        let item = &parsed.script_setup.items()[0];
        let span = swc_common::Spanned::span(item);
        assert_eq!(parsed.script_setup.text(span), "const msg: string = 'hi'");
        let doc_span = parsed.script_setup.document_span(span);
        assert_eq!(&source[doc_span.to_range()], "const msg: string = 'hi'");
    }

    #[test]
    fn test_syntax_error_reports_document_span() {
        let source = "<script>\nconst = 1\n</script>";
        let document = parse_document(source).unwrap();
        let cm: Lrc<SourceMap> = Default::default();
        let err = parse_scripts(&cm, &document, "App.vue").err().unwrap();
        assert_eq!(err.code, crate::error::ErrorCode::ScriptSyntax);
        assert!(err.span.start >= 9);
    }

    #[test]
    fn test_type_syntax_requires_typed_dialect() {
        let source = "<script setup>\nconst a: number = 1\n</script>";
        let document = parse_document(source).unwrap();
        let cm: Lrc<SourceMap> = Default::default();
        assert!(parse_scripts(&cm, &document, "App.vue").is_err());
    }

    #[test]
    fn test_parse_expression_rejects_statements() {
        assert!(parse_expression("a + b").is_some());
        assert!(parse_expression("a = 1; b()").is_none());
        assert!(parse_statements("a = 1; b()").is_some());
    }
}
