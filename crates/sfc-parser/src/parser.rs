//! Document segmenter.
//!
//! Streams the document through [`SfcLexer`] and isolates the template,
//! `<script>` and `<script setup>` segments. While inside the template it
//! collects component candidates, binding expressions and `ref` names.

use crate::ast::*;
use crate::error::{ParseError, ParseResult};
use crate::identifiers;
use crate::lexer::{RawAttr, SfcLexer, Token};
use crate::tags;
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use source_map::Span;

static INTERPOLATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{(.*?)\}\}").unwrap());
static FOR_ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s(?:in|of)\s").unwrap());

/// Segment a component document.
pub fn parse_document(source: &str) -> ParseResult<Document> {
    Segmenter::new(source).run()
}

/// An open `<template>` waiting for its matching close tag.
struct OpenTemplate {
    open_span: Span,
    attrs: Vec<Attr>,
}

struct Segmenter<'a> {
    lexer: SfcLexer<'a>,
    source: &'a str,
    document: Document,
    template_depth: u32,
    open_template: Option<OpenTemplate>,
    components: IndexSet<String>,
    expressions: IndexSet<String>,
    refs: IndexSet<String>,
    pending_text: Option<(usize, usize)>,
}

impl<'a> Segmenter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lexer: SfcLexer::new(source),
            source,
            document: Document::new(source),
            template_depth: 0,
            open_template: None,
            components: IndexSet::new(),
            expressions: IndexSet::new(),
            refs: IndexSet::new(),
            pending_text: None,
        }
    }

    fn run(mut self) -> ParseResult<Document> {
        while let Some(token) = self.lexer.next_token() {
            if let Token::Text { span, .. } = token {
                // Merge adjacent text runs so `{{ a < b }}` stays whole
                let start = self.pending_text.map_or(span.start as usize, |(s, _)| s);
                self.pending_text = Some((start, span.end as usize));
                continue;
            }
            self.flush_text();

            match token {
                Token::OpenTag {
                    name,
                    attrs,
                    self_closing,
                    span,
                } => self.open_tag(name, &attrs, self_closing, span)?,
                Token::CloseTag { name, span } => self.close_tag(name, span),
                Token::Comment { .. } | Token::Text { .. } => {}
            }
        }
        self.flush_text();

        if let Some(open) = &self.open_template {
            return Err(ParseError::unclosed_tag("template", open.open_span));
        }

        self.check_languages()?;

        if let Some(template) = self.document.template.as_mut() {
            let usages =
                identifiers::template_usages(self.expressions.iter().map(String::as_str));
            template.components = std::mem::take(&mut self.components);
            template.expressions = std::mem::take(&mut self.expressions);
            template.identifiers = std::mem::take(&mut self.refs);
            template.identifiers.extend(usages);
        }

        tracing::debug!(
            template = self.document.template.is_some(),
            script = self.document.script.is_some(),
            script_setup = self.document.script_setup.is_some(),
            "segmented document"
        );

        Ok(self.document)
    }

    fn open_tag(
        &mut self,
        name: &'a str,
        raw_attrs: &[RawAttr<'a>],
        self_closing: bool,
        span: Span,
    ) -> ParseResult<()> {
        if name == "template" {
            self.template_depth += 1;
            if self.template_depth == 1 {
                if let Some(existing) = &self.document.template {
                    return Err(ParseError::duplicate_block("template", existing.span.merge(span)));
                }
                self.open_template = Some(OpenTemplate {
                    open_span: span,
                    attrs: raw_attrs.iter().map(to_attr).collect(),
                });
            }
        }

        if self.template_depth > 0 {
            self.collect_tag(name, raw_attrs);
            if self_closing {
                self.close_tag(name, Span::empty(span.end));
            }
            return Ok(());
        }

        // Top-level blocks other than the template hold raw text
        let content_start = span.end;
        let content = if self_closing {
            ""
        } else {
            match self.lexer.read_raw_text(name) {
                Some(content) => content,
                None => return Err(ParseError::unclosed_tag(name, span)),
            }
        };
        let content_end = content_start + content.len() as u32;
        let end = if self_closing {
            span.end
        } else {
            match self.lexer.next_token() {
                Some(Token::CloseTag { span: close, .. }) => close.end,
                _ => return Err(ParseError::unclosed_tag(name, span)),
            }
        };

        if name == "script" {
            self.script_segment(
                raw_attrs,
                Segment {
                    span: Span::new(span.start, end),
                    content_span: Span::new(content_start, content_end),
                    content: content.to_owned(),
                    attrs: raw_attrs.iter().map(to_attr).collect(),
                },
            )?;
        }
        Ok(())
    }

    fn close_tag(&mut self, name: &str, span: Span) {
        if name != "template" || self.template_depth == 0 {
            return;
        }
        self.template_depth -= 1;
        if self.template_depth > 0 {
            return;
        }
        if let Some(open) = self.open_template.take() {
            let content_start = open.open_span.end;
            let content_end = span.start.max(content_start);
            self.document.template = Some(TemplateSegment {
                segment: Segment {
                    span: Span::new(open.open_span.start, span.end.max(content_end)),
                    content_span: Span::new(content_start, content_end),
                    content: self.source[content_start as usize..content_end as usize].to_owned(),
                    attrs: open.attrs,
                },
                components: IndexSet::new(),
                expressions: IndexSet::new(),
                identifiers: IndexSet::new(),
            });
        }
    }

    fn script_segment(&mut self, raw_attrs: &[RawAttr<'_>], segment: Segment) -> ParseResult<()> {
        let lang = match raw_attrs.iter().find(|a| a.name == "lang") {
            Some(RawAttr {
                value: Some(value),
                value_span,
                span,
                ..
            }) if !value.is_empty() => ScriptLang::parse(value).ok_or_else(|| {
                ParseError::unsupported_language(value, value_span.unwrap_or(*span))
            })?,
            _ => ScriptLang::Js,
        };
        let setup = segment.has_attr("setup");
        let slot = if setup {
            &mut self.document.script_setup
        } else {
            &mut self.document.script
        };
        if let Some(existing) = slot.as_ref() {
            let block = if setup { "<script setup>" } else { "<script>" };
            return Err(ParseError::duplicate_block(
                block,
                existing.span.merge(segment.span),
            ));
        }
        *slot = Some(ScriptSegment {
            segment,
            lang,
            setup,
        });
        Ok(())
    }

    fn check_languages(&self) -> ParseResult<()> {
        if let (Some(script), Some(setup)) = (&self.document.script, &self.document.script_setup) {
            if script.lang != setup.lang {
                let span = setup
                    .attrs
                    .iter()
                    .find(|a| a.name == "lang")
                    .map_or(setup.span, |a| a.span);
                return Err(ParseError::language_mismatch(span));
            }
        }
        Ok(())
    }

    fn collect_tag(&mut self, name: &str, attrs: &[RawAttr<'_>]) {
        if !tags::is_builtin_tag(name) {
            self.components.insert(tags::component_name(name));
        }

        for attr in attrs {
            let Some(value) = attr.value.filter(|v| !v.is_empty()) else {
                continue;
            };
            let value = decode_entities(value);
            if is_binding(attr.name) {
                let expression = if attr.name == "v-for" {
                    strip_for_alias(&value)
                } else {
                    &value
                };
                self.expressions.insert(expression.to_owned());
            }
            if attr.name == "ref" {
                self.refs.insert(value.clone());
            }
        }
    }

    fn flush_text(&mut self) {
        let Some((start, end)) = self.pending_text.take() else {
            return;
        };
        if self.template_depth == 0 {
            return;
        }
        let text = decode_entities(&self.source[start..end]);
        for captures in INTERPOLATION.captures_iter(&text) {
            self.expressions.insert(captures[1].to_owned());
        }
    }
}

fn to_attr(raw: &RawAttr<'_>) -> Attr {
    Attr {
        name: raw.name.into(),
        value: raw.value.map(str::to_owned),
        span: raw.span,
        value_span: raw.value_span,
    }
}

/// Attribute names whose values are script expressions.
fn is_binding(name: &str) -> bool {
    name.starts_with("v-") || name.starts_with('@') || name.starts_with(':')
}

/// `(item, index) in items` -> `items`
fn strip_for_alias(value: &str) -> &str {
    match FOR_ALIAS.find(value) {
        Some(m) => &value[m.end()..],
        None => value,
    }
}

/// Decode the character references markup allows in attribute values and
/// text.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
