//! Parser for templates.
//!
//! Offsets are relative to the template content. Malformed markup is
//! recovered from where possible; problems are collected rather than
//! aborting the parse.

use crate::ast::*;
use crate::error::{CompileError, CompileErrorCode};
use crate::expression::parameter_bindings;
use once_cell::sync::Lazy;
use regex::Regex;
use sfc_parser::decode_entities;
use sfc_parser::tags::is_void_tag;
use smol_str::SmolStr;
use source_map::Span;

static FOR_ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([\s\S]*?)\s+(?:in|of)\s+([\s\S]*)$").unwrap());

/// Parse a template into an AST, along with any markup errors.
pub fn parse_template(source: &str) -> (TemplateAst, Vec<CompileError>) {
    let mut parser = TemplateParser::new(source);
    let ast = parser.parse();
    (ast, parser.errors)
}

struct TemplateParser<'a> {
    source: &'a str,
    pos: usize,
    open: Vec<SmolStr>,
    errors: Vec<CompileError>,
}

/// Attributes of an element, sorted by kind.
#[derive(Default)]
struct AttributeSet {
    attrs: Vec<Attribute>,
    directives: Vec<Directive>,
    props: Vec<Prop>,
    events: Vec<EventListener>,
}

impl AttributeSet {
    fn take_directive(&mut self, name: &str) -> Option<Directive> {
        let index = self.directives.iter().position(|d| d.name == name)?;
        Some(self.directives.remove(index))
    }
}

impl<'a> TemplateParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            open: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn parse(&mut self) -> TemplateAst {
        let children = self.parse_children(None);
        let span = Span::new(0, self.source.len() as u32);
        TemplateAst::with_children(children, span)
    }

    fn remaining(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_while<F: Fn(char) -> bool>(&mut self, pred: F) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if pred(c) {
                self.advance();
            } else {
                break;
            }
        }
        &self.source[start..self.pos]
    }

    fn read_until(&mut self, s: &str) -> &'a str {
        let start = self.pos;
        let end = self.remaining().find(s).map_or(self.source.len(), |i| start + i);
        self.pos = end;
        &self.source[start..end]
    }

    /// Whether the input is at a tag, end tag or comment.
    fn at_markup(&self) -> bool {
        let rest = self.remaining();
        if rest.starts_with("<!--") || rest.starts_with("<!") {
            return true;
        }
        let mut chars = rest.chars();
        if chars.next() != Some('<') {
            return false;
        }
        match chars.next() {
            Some('/') => chars.next().is_some_and(|c| c.is_ascii_alphabetic()),
            Some(c) => c.is_ascii_alphabetic(),
            None => false,
        }
    }

    /// Name of the end tag at the cursor, if any.
    fn end_tag_name(&self) -> Option<&'a str> {
        let rest = self.remaining().strip_prefix("</")?;
        let len = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        Some(&rest[..len])
    }

    fn parse_children(&mut self, end_tag: Option<&str>) -> Vec<TemplateNode> {
        let mut children = Vec::new();

        while !self.is_eof() {
            if let Some(name) = self.end_tag_name() {
                if end_tag == Some(name) || self.open.iter().any(|open| open == name) {
                    break;
                }
                // Stray end tag.
                let start = self.pos;
                self.read_until(">");
                self.consume(">");
                self.errors.push(CompileError::new(
                    format!("tag </{}> has no matching start tag.", name),
                    Span::new(start as u32, self.pos as u32),
                    CompileErrorCode::UnclosedElement,
                ));
                continue;
            }

            if self.starts_with("<!--") {
                children.push(TemplateNode::Comment(self.parse_comment()));
            } else if self.starts_with("<!") {
                self.read_until(">");
                self.consume(">");
            } else if self.at_markup() {
                if let Some(node) = self.parse_element() {
                    children.push(node);
                }
            } else {
                children.push(TemplateNode::Text(self.parse_text()));
            }
        }

        children
    }

    fn parse_comment(&mut self) -> CommentNode {
        let start = self.pos;
        self.consume("<!--");
        let content = self.read_until("-->");
        self.consume("-->");
        CommentNode {
            content: content.to_string(),
            span: Span::new(start as u32, self.pos as u32),
        }
    }

    /// Parse a run of text and interpolations up to the next markup.
    fn parse_text(&mut self) -> TextNode {
        let start = self.pos;
        let mut parts = Vec::new();
        let mut run_start = self.pos;

        while !self.is_eof() && !self.at_markup() {
            if self.starts_with("{{") {
                if let Some(close) = self.remaining()[2..].find("}}") {
                    self.flush_static(&mut parts, run_start);
                    parts.push(TextPart::Interpolation(self.parse_interpolation(close)));
                    run_start = self.pos;
                    continue;
                }
            }
            self.advance();
        }
        self.flush_static(&mut parts, run_start);

        TextNode {
            parts,
            span: Span::new(start as u32, self.pos as u32),
        }
    }

    fn flush_static(&self, parts: &mut Vec<TextPart>, run_start: usize) {
        if run_start < self.pos {
            parts.push(TextPart::Static(decode_entities(&self.source[run_start..self.pos])));
        }
    }

    /// Parse `{{ expr }}`; `close` is the offset of `}}` after the opening braces.
    fn parse_interpolation(&mut self, close: usize) -> InterpolationNode {
        let start = self.pos;
        let inner_start = start + 2;
        let inner = &self.source[inner_start..inner_start + close];
        let leading = inner.len() - inner.trim_start().len();
        let content = inner.trim();
        let expr_start = (inner_start + leading) as u32;
        self.pos = inner_start + close + 2;

        InterpolationNode {
            expression: Expression::new(
                decode_entities(content),
                Span::new(expr_start, expr_start + content.len() as u32),
            ),
            span: Span::new(start as u32, self.pos as u32),
        }
    }

    fn parse_element(&mut self) -> Option<TemplateNode> {
        let start = self.pos;
        self.consume("<");

        let tag_start = self.pos;
        let tag: SmolStr = self
            .read_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .into();
        let tag_span = Span::new(tag_start as u32, self.pos as u32);

        let mut set = self.parse_attributes();

        self.skip_whitespace();
        let self_closing = self.consume("/>");
        if !self_closing && !self.consume(">") {
            self.errors.push(CompileError::unclosed_element(
                &tag,
                Span::new(start as u32, self.pos as u32),
            ));
            return None;
        }

        let is_void = is_void_tag(&tag);
        let children = if self_closing || is_void {
            Vec::new()
        } else {
            self.open.push(tag.clone());
            let children = self.parse_children(Some(tag.as_str()));
            self.open.pop();
            if self.end_tag_name() == Some(tag.as_str()) {
                self.read_until(">");
                self.consume(">");
            } else {
                self.errors.push(CompileError::unclosed_element(
                    &tag,
                    Span::new(start as u32, tag_span.end),
                ));
            }
            children
        };

        let span = Span::new(start as u32, self.pos as u32);

        let v_for = set.take_directive("for");
        let v_if = set.take_directive("if");
        let v_else_if = set.take_directive("else-if");
        let v_else = set.take_directive("else");
        let key_attr = set
            .props
            .iter()
            .find(|p| !p.is_dynamic && p.name == "key")
            .map(|p| p.value.clone());

        let mut node = self.create_node(tag, tag_span, set, children, self_closing, span);

        let branch = match (v_if, v_else_if, v_else) {
            (Some(dir), _, _) => Some((IfBranchType::If, dir)),
            (None, Some(dir), _) => Some((IfBranchType::ElseIf, dir)),
            (None, None, Some(dir)) => Some((IfBranchType::Else, dir)),
            _ => None,
        };
        if let Some((branch_type, dir)) = branch {
            let condition = if branch_type == IfBranchType::Else {
                None
            } else {
                let condition = dir
                    .value
                    .unwrap_or_else(|| Expression::new("", Span::new(dir.span.end, dir.span.end)));
                Some(condition)
            };
            node = TemplateNode::If(IfNode {
                branches: vec![IfBranch {
                    condition,
                    branch_type,
                    children: vec![node],
                    span,
                }],
                span,
            });
        }

        if let Some(dir) = v_for {
            let value = dir
                .value
                .unwrap_or_else(|| Expression::new("", Span::new(dir.span.end, dir.span.end)));
            if let Some(mut for_node) = self.parse_v_for(value) {
                for_node.children = vec![node];
                for_node.key_attr = key_attr;
                for_node.span = span;
                node = TemplateNode::For(for_node);
            }
        }

        Some(node)
    }

    fn create_node(
        &self,
        tag: SmolStr,
        tag_span: Span,
        mut set: AttributeSet,
        children: Vec<TemplateNode>,
        self_closing: bool,
        span: Span,
    ) -> TemplateNode {
        if tag == "slot" {
            let name = match set.attrs.iter().position(|a| a.name == "name") {
                Some(index) => {
                    let attr = set.attrs.remove(index);
                    SlotName::Static(attr.value.unwrap_or_default().into())
                }
                None => match set.props.iter().position(|p| !p.is_dynamic && p.name == "name") {
                    Some(index) => SlotName::Dynamic(set.props.remove(index).value),
                    None => SlotName::Static("default".into()),
                },
            };
            return TemplateNode::SlotOutlet(SlotOutletNode {
                name,
                props: set.props,
                attrs: set.attrs,
                fallback: children,
                span,
            });
        }

        if tag == "template" && set.directives.iter().any(|d| d.name == "slot") {
            return TemplateNode::Template(TemplateElementNode {
                directives: set.directives,
                children,
                span,
            });
        }

        let is_component = get_element_type(&tag) == ElementType::Component;
        TemplateNode::Element(ElementNode {
            tag,
            is_component,
            attrs: set.attrs,
            directives: set.directives,
            props: set.props,
            events: set.events,
            children,
            slots: Default::default(),
            self_closing,
            span,
            tag_span,
        })
    }

    fn parse_attributes(&mut self) -> AttributeSet {
        let mut set = AttributeSet::default();

        loop {
            self.skip_whitespace();
            if self.is_eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }

            let attr_start = self.pos;
            let name = self.read_while(|c| !c.is_whitespace() && !matches!(c, '=' | '>' | '"' | '\''));
            let name = match name.strip_suffix('/') {
                Some(stripped) if self.starts_with(">") => {
                    self.pos -= 1;
                    stripped
                }
                _ => name,
            };
            if name.is_empty() {
                self.advance();
                continue;
            }

            self.skip_whitespace();
            let value = if self.consume("=") {
                self.skip_whitespace();
                Some(self.parse_attribute_value())
            } else {
                None
            };

            let span = Span::new(attr_start as u32, self.pos as u32);
            self.classify_attribute(&mut set, name, value, span);
        }

        set
    }

    fn classify_attribute(
        &self,
        set: &mut AttributeSet,
        name: &str,
        value: Option<(String, Span)>,
        span: Span,
    ) {
        let expression = value.clone().map(|(v, s)| Expression::new(v, s));

        if name == "v-bind" || name.starts_with(':') || name.starts_with("v-bind:") {
            let raw = name
                .strip_prefix("v-bind")
                .unwrap_or(name)
                .trim_start_matches(':');
            let (arg, modifiers) = split_modifiers(raw);
            let Some(value) = expression else {
                return;
            };
            let name_expr = dynamic_arg(arg, span);
            set.props.push(Prop {
                name: arg.into(),
                value,
                is_dynamic: name_expr.is_some(),
                name_expr,
                modifiers,
                span,
            });
        } else if name == "v-on" || name.starts_with('@') || name.starts_with("v-on:") {
            let raw = name
                .strip_prefix("v-on:")
                .or_else(|| name.strip_prefix('@'))
                .unwrap_or("");
            let (arg, modifiers) = split_modifiers(raw);
            let handler = expression.unwrap_or_else(|| Expression::new("", Span::new(span.end, span.end)));
            let name_expr = dynamic_arg(arg, span);
            set.events.push(EventListener {
                name: arg.into(),
                is_dynamic: name_expr.is_some(),
                name_expr,
                handler,
                modifiers,
                span,
            });
        } else if name == "v-slot" || name.starts_with('#') || name.starts_with("v-slot:") {
            let raw = name
                .strip_prefix("v-slot:")
                .or_else(|| name.strip_prefix('#'))
                .unwrap_or("");
            let (arg, modifiers) = split_modifiers(raw);
            let arg = if arg.is_empty() {
                None
            } else {
                Some(match dynamic_arg(arg, span) {
                    Some(expr) => DirectiveArg::Dynamic(expr),
                    None => DirectiveArg::Static(arg.into(), span),
                })
            };
            set.directives.push(Directive {
                name: "slot".into(),
                raw_name: name.into(),
                arg,
                modifiers,
                value: expression,
                span,
            });
        } else if let Some(rest) = name.strip_prefix("v-") {
            let (head, modifiers) = split_modifiers(rest);
            let (dir_name, arg) = match head.split_once(':') {
                Some((dir_name, arg)) => (
                    dir_name,
                    Some(match dynamic_arg(arg, span) {
                        Some(expr) => DirectiveArg::Dynamic(expr),
                        None => DirectiveArg::Static(arg.into(), span),
                    }),
                ),
                None => (head, None),
            };
            set.directives.push(Directive {
                name: dir_name.into(),
                raw_name: name.into(),
                arg,
                modifiers,
                value: expression,
                span,
            });
        } else {
            let (attr_value, value_span) = match value {
                Some((v, s)) => (Some(v), Some(s)),
                None => (None, None),
            };
            set.attrs.push(Attribute {
                name: name.into(),
                value: attr_value,
                span,
                value_span,
            });
        }
    }

    /// Parse an attribute value, returning the decoded text and the span of
    /// the raw text between the quotes.
    fn parse_attribute_value(&mut self) -> (String, Span) {
        if let Some(quote) = self.peek().filter(|c| *c == '"' || *c == '\'') {
            self.advance();
            let value_start = self.pos;
            let end = self.remaining().find(quote).map_or(self.source.len(), |i| value_start + i);
            self.pos = end;
            self.consume(&quote.to_string());
            let raw = &self.source[value_start..end];
            (decode_entities(raw), Span::new(value_start as u32, end as u32))
        } else {
            let start = self.pos;
            let raw = self.read_while(|c| !c.is_whitespace() && c != '>');
            (decode_entities(raw), Span::new(start as u32, self.pos as u32))
        }
    }

    /// Split a `v-for` value into its source expression and aliases.
    fn parse_v_for(&mut self, value: Expression) -> Option<ForNode> {
        let invalid = |errors: &mut Vec<CompileError>| {
            errors.push(CompileError::invalid_v_for(&value.content, value.span));
            None
        };

        let Some(captures) = FOR_ALIAS.captures(&value.content) else {
            return invalid(&mut self.errors);
        };
        let (Some(alias), Some(source)) = (captures.get(1), captures.get(2)) else {
            return invalid(&mut self.errors);
        };

        let alias_text = alias.as_str().trim();
        let alias_inner = alias_text
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(alias_text)
            .trim();
        let params = match parameter_bindings(alias_inner) {
            Some(params) if !params.is_empty() && params.len() <= 3 => params,
            _ => return invalid(&mut self.errors),
        };

        let source_text = source.as_str().trim_end();
        let source_start = value.span.start + source.start() as u32;
        let alias_start = value.span.start
            + alias.start() as u32
            + alias.as_str().find(alias_inner).unwrap_or(0) as u32;

        Some(ForNode {
            source: Expression::new(
                source_text,
                Span::new(source_start, source_start + source_text.len() as u32),
            ),
            aliases: ForAlias {
                pattern: alias_inner.to_string(),
                span: Span::new(alias_start, alias_start + alias_inner.len() as u32),
            },
            bindings: params.into_iter().flatten().map(SmolStr::from).collect(),
            children: Vec::new(),
            key_attr: None,
            raw: value.content.clone(),
            span: value.span,
        })
    }
}

/// Split `name.mod1.mod2`, treating a bracketed dynamic name as one unit.
fn split_modifiers(raw: &str) -> (&str, Vec<SmolStr>) {
    let head_end = if raw.starts_with('[') {
        raw.find(']').map_or(raw.len(), |i| i + 1)
    } else {
        0
    };
    match raw[head_end..].find('.') {
        Some(dot) => {
            let split = head_end + dot;
            let modifiers = raw[split + 1..]
                .split('.')
                .filter(|m| !m.is_empty())
                .map(SmolStr::from)
                .collect();
            (&raw[..split], modifiers)
        }
        None => (raw, Vec::new()),
    }
}

/// Expression of a `[name]` argument.
fn dynamic_arg(arg: &str, span: Span) -> Option<Expression> {
    let inner = arg.strip_prefix('[')?.strip_suffix(']')?;
    Some(Expression::new(inner, span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> TemplateAst {
        let (ast, errors) = parse_template(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        ast
    }

    #[test]
    fn test_parse_simple_element() {
        let ast = parse_ok("<div>Hello</div>");
        assert_eq!(ast.children.len(), 1);
    }

    #[test]
    fn test_text_merges_interpolations() {
        let ast = parse_ok("Hi {{ name }}!");
        let TemplateNode::Text(text) = &ast.children[0] else {
            panic!("expected text");
        };
        assert_eq!(text.parts.len(), 3);
        let TextPart::Interpolation(node) = &text.parts[1] else {
            panic!("expected interpolation");
        };
        assert_eq!(node.expression.content, "name");
        assert_eq!(node.expression.span, Span::new(6, 10));
    }

    #[test]
    fn test_less_than_in_text() {
        let ast = parse_ok("<p>a < b</p>");
        let TemplateNode::Element(p) = &ast.children[0] else {
            panic!("expected element");
        };
        assert_eq!(p.children.len(), 1);
    }

    #[test]
    fn test_parse_v_for() {
        let source = r#"<li v-for="(item, i) in items" :key="item.id">{{ item }}</li>"#;
        let ast = parse_ok(source);
        let TemplateNode::For(node) = &ast.children[0] else {
            panic!("expected for node");
        };
        assert_eq!(node.aliases.pattern, "item, i");
        assert_eq!(node.bindings, vec![SmolStr::from("item"), SmolStr::from("i")]);
        assert_eq!(node.source.content, "items");
        assert_eq!(&source[node.source.span.to_range()], "items");
        assert!(node.key_attr.is_some());
    }

    #[test]
    fn test_invalid_v_for() {
        let (_, errors) = parse_template(r#"<li v-for="items"></li>"#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, CompileErrorCode::InvalidVFor);
    }

    #[test]
    fn test_v_for_wraps_v_if() {
        let ast = parse_ok(r#"<li v-for="x in xs" v-if="x.ok"></li>"#);
        let TemplateNode::For(node) = &ast.children[0] else {
            panic!("expected for node");
        };
        assert!(matches!(node.children[0], TemplateNode::If(_)));
    }

    #[test]
    fn test_parse_component_attributes() {
        let ast = parse_ok(r#"<MyComponent :value.sync="v" @click.stop="handler" v-bind="rest" title="x" />"#);
        let TemplateNode::Element(node) = &ast.children[0] else {
            panic!("expected element");
        };
        assert!(node.is_component);
        assert_eq!(node.props.len(), 2);
        assert_eq!(node.props[0].name, "value");
        assert!(node.props[0].has_modifier("sync"));
        assert!(node.props[1].is_object_spread());
        assert_eq!(node.events[0].name, "click");
        assert_eq!(node.events[0].modifiers, vec![SmolStr::from("stop")]);
        assert_eq!(node.get_attr("title"), Some("x"));
    }

    #[test]
    fn test_dynamic_argument_keeps_dots() {
        let (arg, modifiers) = split_modifiers("[a.b].prevent");
        assert_eq!(arg, "[a.b]");
        assert_eq!(modifiers, vec![SmolStr::from("prevent")]);
    }

    #[test]
    fn test_parse_slots() {
        let ast = parse_ok(r#"<Comp><template #row="{ item }">{{ item }}</template></Comp>"#);
        let TemplateNode::Element(comp) = &ast.children[0] else {
            panic!("expected element");
        };
        assert!(matches!(comp.children[0], TemplateNode::Template(_)));

        let ast = parse_ok(r#"<slot name="header">Default</slot>"#);
        let TemplateNode::SlotOutlet(node) = &ast.children[0] else {
            panic!("expected slot outlet");
        };
        assert!(matches!(&node.name, SlotName::Static(name) if name == "header"));
        assert!(!node.fallback.is_empty());
    }

    #[test]
    fn test_unclosed_and_stray_tags() {
        let (ast, errors) = parse_template("<div><span></div>");
        assert_eq!(ast.children.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "tag <span> has no matching end tag.");

        let (_, errors) = parse_template("<div></p></div>");
        assert_eq!(errors[0].message, "tag </p> has no matching start tag.");
    }

    #[test]
    fn test_void_elements() {
        let ast = parse_ok("<div><input v-model=\"q\"><br></div>");
        let TemplateNode::Element(div) = &ast.children[0] else {
            panic!("expected element");
        };
        assert_eq!(div.children.len(), 2);
    }
}
