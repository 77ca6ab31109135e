//! Template transformations.
//!
//! Runs between parsing and code generation: drops comments, chains
//! `v-else-if`/`v-else` branches onto their `v-if`, applies the whitespace
//! mode, moves slot content into the owning component, and checks the
//! root node.

use crate::ast::*;
use crate::error::{CompileError, CompileErrorCode, Tip};
use crate::WhitespaceMode;
use once_cell::sync::Lazy;
use regex::Regex;
use smol_str::SmolStr;
use source_map::Span;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \f\t\r\n]+").unwrap());

/// Transform context for tracking state during transformation.
pub struct TransformContext {
    pub whitespace: WhitespaceMode,
    /// Depth of enclosing `<pre>` elements.
    in_pre: usize,
    /// Errors found while transforming.
    pub errors: Vec<CompileError>,
    /// Non-fatal notes about ignored constructs.
    pub tips: Vec<Tip>,
}

impl TransformContext {
    /// Create a new transform context.
    pub fn new(whitespace: WhitespaceMode) -> Self {
        Self {
            whitespace,
            in_pre: 0,
            errors: Vec::new(),
            tips: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Span, code: CompileErrorCode) {
        self.errors.push(CompileError::new(message, span, code));
    }

    fn tip(&mut self, message: impl Into<String>, span: Span) {
        self.tips.push(Tip::new(message, span));
    }
}

/// Transform a template AST in place.
pub fn transform(ast: &mut TemplateAst, ctx: &mut TransformContext) {
    let children = std::mem::take(&mut ast.children);
    ast.children = transform_children(children, ctx);
}

fn transform_children(children: Vec<TemplateNode>, ctx: &mut TransformContext) -> Vec<TemplateNode> {
    let children = chain_conditionals(children, ctx);
    let children: Vec<TemplateNode> = children
        .into_iter()
        .map(|mut node| {
            transform_node(&mut node, ctx);
            node
        })
        .collect();
    apply_whitespace(children, ctx)
}

/// Transform a single node.
fn transform_node(node: &mut TemplateNode, ctx: &mut TransformContext) {
    match node {
        TemplateNode::Element(el) => transform_element(el, ctx),
        TemplateNode::For(f) => transform_for(f, ctx),
        TemplateNode::If(i) => transform_if(i, ctx),
        TemplateNode::Template(t) => {
            t.children = transform_children(std::mem::take(&mut t.children), ctx);
        }
        TemplateNode::SlotOutlet(s) => {
            s.fallback = transform_children(std::mem::take(&mut s.fallback), ctx);
        }
        TemplateNode::Text(_) | TemplateNode::Comment(_) => {}
    }
}

/// Transform an element node.
fn transform_element(el: &mut ElementNode, ctx: &mut TransformContext) {
    for dir in &el.directives {
        if matches!(dir.name.as_str(), "once" | "pre") {
            ctx.tip(
                format!("{} is not supported and has been ignored.", dir.raw_name),
                dir.span,
            );
        }
    }
    el.directives
        .retain(|d| !matches!(d.name.as_str(), "once" | "pre" | "cloak"));

    let is_pre = el.tag == "pre";
    if is_pre {
        ctx.in_pre += 1;
    }
    let children = transform_children(std::mem::take(&mut el.children), ctx);
    if is_pre {
        ctx.in_pre -= 1;
    }

    if el.is_component || el.tag == "component" {
        el.children = extract_slots(el, children);
    } else {
        el.children = children;
    }
}

/// Move `<template v-slot>` children, or the whole content when `v-slot`
/// sits on the component itself, into `el.slots`.
fn extract_slots(el: &mut ElementNode, children: Vec<TemplateNode>) -> Vec<TemplateNode> {
    if let Some(index) = el.directives.iter().position(|d| d.name == "slot") {
        let dir = el.directives.remove(index);
        let slot = slot_from_directive(&dir, children, el.span);
        el.slots.insert(slot_key(&slot.name), slot);
        return Vec::new();
    }

    let mut rest = Vec::new();
    for child in children {
        match child {
            TemplateNode::Template(template) => match template.slot_directive() {
                Some(dir) => {
                    let slot = slot_from_directive(dir, template.children.clone(), template.span);
                    el.slots.insert(slot_key(&slot.name), slot);
                }
                None => rest.push(TemplateNode::Template(template)),
            },
            other => rest.push(other),
        }
    }

    if el.slots.is_empty() {
        return rest;
    }
    // Once named slots are present, loose content belongs to the default slot.
    if rest.iter().any(|node| !node.is_blank()) && !el.slots.contains_key("default") {
        let span = rest
            .iter()
            .map(TemplateNode::span)
            .reduce(Span::merge)
            .unwrap_or(el.span);
        el.slots.insert(
            "default".into(),
            SlotNode {
                name: SlotName::Static("default".into()),
                props: None,
                children: trim_blank_edges(rest),
                span,
            },
        );
    }
    Vec::new()
}

fn slot_from_directive(dir: &Directive, children: Vec<TemplateNode>, span: Span) -> SlotNode {
    let name = match &dir.arg {
        Some(DirectiveArg::Static(name, _)) => SlotName::Static(name.clone()),
        Some(DirectiveArg::Dynamic(expr)) => SlotName::Dynamic(expr.clone()),
        None => SlotName::Static("default".into()),
    };
    let props = dir
        .value
        .as_ref()
        .filter(|value| !value.content.trim().is_empty())
        .map(|value| SlotProps {
            pattern: value.content.trim().to_string(),
            span: value.span,
        });
    SlotNode {
        name,
        props,
        children,
        span,
    }
}

fn slot_key(name: &SlotName) -> SmolStr {
    match name {
        SlotName::Static(name) => name.clone(),
        SlotName::Dynamic(expr) => format!("[{}]", expr.content).into(),
    }
}

/// Transform a for node.
fn transform_for(f: &mut ForNode, ctx: &mut TransformContext) {
    for child in &mut f.children {
        transform_node(child, ctx);
    }

    if f.key_attr.is_none() {
        let component = f.children.iter().find_map(|child| match child {
            TemplateNode::Element(el) if el.is_component => Some(el.tag.clone()),
            _ => None,
        });
        if let Some(tag) = component {
            ctx.tip(
                format!(
                    "<{} v-for=\"{}\">: component lists rendered with v-for should have explicit keys. See https://vuejs.org/guide/list.html#key for more info.",
                    tag, f.raw
                ),
                f.span,
            );
        }
    }
}

/// Transform an if node.
fn transform_if(i: &mut IfNode, ctx: &mut TransformContext) {
    for branch in &mut i.branches {
        for child in &mut branch.children {
            transform_node(child, ctx);
        }
    }
}

/// Attach `v-else-if`/`v-else` nodes to the preceding `v-if`. Comments
/// are dropped here, and blank text between branches goes with them.
fn chain_conditionals(children: Vec<TemplateNode>, ctx: &mut TransformContext) -> Vec<TemplateNode> {
    let mut out: Vec<TemplateNode> = Vec::with_capacity(children.len());

    for node in children {
        let mut if_node = match node {
            TemplateNode::If(if_node) => if_node,
            TemplateNode::Comment(_) => continue,
            other => {
                out.push(other);
                continue;
            }
        };

        let first_type = if_node.branches[0].branch_type;
        if first_type == IfBranchType::If {
            out.push(TemplateNode::If(if_node));
            continue;
        }

        while out.last().is_some_and(TemplateNode::is_blank) {
            out.pop();
        }
        match out.last_mut() {
            Some(TemplateNode::If(prev))
                if prev.branches.last().map(|b| b.branch_type) != Some(IfBranchType::Else) =>
            {
                prev.span = prev.span.merge(if_node.span);
                prev.branches.append(&mut if_node.branches);
            }
            _ => {
                let branch = &if_node.branches[0];
                let tag = branch
                    .children
                    .first()
                    .map(node_tag)
                    .unwrap_or_default();
                let used = match &branch.condition {
                    Some(cond) if first_type == IfBranchType::ElseIf => {
                        format!("v-else-if=\"{}\"", cond.content)
                    }
                    _ => "v-else".to_string(),
                };
                ctx.error(
                    format!("{} used on element <{}> without corresponding v-if.", used, tag),
                    if_node.span,
                    CompileErrorCode::OrphanElse,
                );
            }
        }
    }

    out
}

fn node_tag(node: &TemplateNode) -> String {
    match node {
        TemplateNode::Element(el) => el.tag.to_string(),
        TemplateNode::SlotOutlet(_) => "slot".into(),
        TemplateNode::Template(_) => "template".into(),
        TemplateNode::For(f) => f.children.first().map(node_tag).unwrap_or_default(),
        _ => String::new(),
    }
}

/// Apply the whitespace mode to a list of siblings.
fn apply_whitespace(children: Vec<TemplateNode>, ctx: &TransformContext) -> Vec<TemplateNode> {
    if ctx.in_pre > 0 {
        return children;
    }
    let condense = ctx.whitespace == WhitespaceMode::Condense;

    let children = trim_blank_edges(children);
    let mut out = Vec::with_capacity(children.len());
    for node in children {
        let mut text = match node {
            TemplateNode::Text(text) => text,
            other => {
                out.push(other);
                continue;
            }
        };
        if text.is_whitespace() {
            let has_newline = text.parts.iter().any(|part| match part {
                TextPart::Static(s) => s.contains('\n'),
                TextPart::Interpolation(_) => false,
            });
            if condense && has_newline {
                continue;
            }
            text.parts = vec![TextPart::Static(" ".into())];
        } else if condense {
            for part in &mut text.parts {
                if let TextPart::Static(s) = part {
                    *s = WHITESPACE_RUN.replace_all(s, " ").into_owned();
                }
            }
        }
        out.push(TemplateNode::Text(text));
    }
    out
}

/// Drop whitespace-only text at both ends of a child list.
fn trim_blank_edges(mut children: Vec<TemplateNode>) -> Vec<TemplateNode> {
    while children.last().is_some_and(TemplateNode::is_blank) {
        children.pop();
    }
    let leading = children
        .iter()
        .take_while(|node| node.is_blank())
        .count();
    children.drain(..leading);
    children
}

/// Check the template root and return it.
pub fn validate_root<'a>(ast: &'a TemplateAst, ctx: &mut TransformContext) -> Option<&'a TemplateNode> {
    let mut root: Option<&TemplateNode> = None;
    let mut saw_text = false;

    for node in &ast.children {
        match node {
            TemplateNode::Text(text) if text.is_whitespace() => {}
            TemplateNode::Text(text) => {
                saw_text = true;
                let content: String = text
                    .parts
                    .iter()
                    .map(|part| match part {
                        TextPart::Static(s) => s.clone(),
                        TextPart::Interpolation(i) => format!("{{{{ {} }}}}", i.expression.content),
                    })
                    .collect();
                ctx.error(
                    format!("text \"{}\" outside root element will be ignored.", content.trim()),
                    text.span,
                    CompileErrorCode::TextOutsideRoot,
                );
            }
            TemplateNode::Comment(_) => {}
            _ if root.is_none() => root = Some(node),
            _ => {
                ctx.error(
                    "Component template should contain exactly one root element. If you are using v-if on multiple elements, use v-else-if to chain them instead.",
                    node.span(),
                    CompileErrorCode::InvalidRoot,
                );
            }
        }
    }

    match root {
        Some(node) => check_root_constraints(node, ctx),
        None if saw_text => ctx.error(
            "Component template requires a root element, rather than just text.",
            ast.span,
            CompileErrorCode::InvalidRoot,
        ),
        None => {}
    }
    root
}

fn check_root_constraints(node: &TemplateNode, ctx: &mut TransformContext) {
    match node {
        TemplateNode::SlotOutlet(_) | TemplateNode::Template(_) => root_multiple_nodes(node, ctx),
        TemplateNode::Element(el) if el.tag == "template" => root_multiple_nodes(node, ctx),
        TemplateNode::For(f) => ctx.error(
            "Cannot use v-for on stateful component root element because it renders multiple elements.",
            f.span,
            CompileErrorCode::InvalidRoot,
        ),
        TemplateNode::If(i) => {
            for branch in &i.branches {
                for child in &branch.children {
                    check_root_constraints(child, ctx);
                }
            }
        }
        _ => {}
    }
}

fn root_multiple_nodes(node: &TemplateNode, ctx: &mut TransformContext) {
    ctx.error(
        format!(
            "Cannot use <{}> as component root element because it may contain multiple nodes.",
            node_tag(node)
        ),
        node.span(),
        CompileErrorCode::InvalidRoot,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_template;
    use pretty_assertions::assert_eq;

    fn transformed(source: &str, whitespace: WhitespaceMode) -> (TemplateAst, TransformContext) {
        let (mut ast, errors) = parse_template(source);
        assert!(errors.is_empty());
        let mut ctx = TransformContext::new(whitespace);
        transform(&mut ast, &mut ctx);
        (ast, ctx)
    }

    fn element(node: &TemplateNode) -> &ElementNode {
        match node {
            TemplateNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    fn static_text(node: &TemplateNode) -> String {
        match node {
            TemplateNode::Text(text) => text
                .parts
                .iter()
                .map(|p| match p {
                    TextPart::Static(s) => s.as_str(),
                    TextPart::Interpolation(_) => "{}",
                })
                .collect(),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_condense_whitespace() {
        let source = "<div>\n  <span>a</span>\n  <span>b</span> <i>c</i>\n  x   y\n</div>";
        let (ast, _) = transformed(source, WhitespaceMode::Condense);
        let div = element(&ast.children[0]);
        assert_eq!(div.children.len(), 5);
        assert_eq!(static_text(&div.children[2]), " ");
        assert_eq!(static_text(&div.children[4]), " x y ");
    }

    #[test]
    fn test_preserve_whitespace() {
        let source = "<div>\n  <span>a</span>\n  <span>b</span>\n</div>";
        let (ast, _) = transformed(source, WhitespaceMode::Preserve);
        let div = element(&ast.children[0]);
        assert_eq!(div.children.len(), 3);
        assert_eq!(static_text(&div.children[1]), " ");
    }

    #[test]
    fn test_if_chain() {
        let source = "<div><p v-if=\"a\">1</p>\n<!-- c -->\n<p v-else-if=\"b\">2</p>\n<p v-else>3</p></div>";
        let (ast, ctx) = transformed(source, WhitespaceMode::Condense);
        assert!(ctx.errors.is_empty());
        let div = element(&ast.children[0]);
        assert_eq!(div.children.len(), 1);
        let TemplateNode::If(chain) = &div.children[0] else {
            panic!("expected if chain");
        };
        assert_eq!(chain.branches.len(), 3);
    }

    #[test]
    fn test_orphan_else() {
        let (_, ctx) = transformed("<div><p v-else>3</p></div>", WhitespaceMode::Condense);
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(
            ctx.errors[0].message,
            "v-else used on element <p> without corresponding v-if."
        );
    }

    #[test]
    fn test_named_slots_are_extracted() {
        let source = "<Layout>\n  <template #header>H</template>\n  body\n</Layout>";
        let (ast, _) = transformed(source, WhitespaceMode::Condense);
        let layout = element(&ast.children[0]);
        assert!(layout.children.is_empty());
        let keys: Vec<&str> = layout.slots.keys().map(SmolStr::as_str).collect();
        assert_eq!(keys, vec!["header", "default"]);
    }

    #[test]
    fn test_keyless_component_list_tip() {
        let (_, ctx) = transformed(
            "<ul><Item v-for=\"i in items\" /></ul>",
            WhitespaceMode::Condense,
        );
        assert_eq!(ctx.tips.len(), 1);
        assert!(ctx.tips[0].message.starts_with("<Item v-for=\"i in items\">"));
    }

    #[test]
    fn test_ignored_directive_tip() {
        let (ast, ctx) = transformed("<div v-once>x</div>", WhitespaceMode::Condense);
        assert_eq!(ctx.tips[0].message, "v-once is not supported and has been ignored.");
        assert!(element(&ast.children[0]).directives.is_empty());
    }

    #[test]
    fn test_root_validation() {
        let check = |source: &str| {
            let (ast, mut ctx) = transformed(source, WhitespaceMode::Condense);
            validate_root(&ast, &mut ctx);
            ctx.errors
        };
        assert!(check("<div></div>").is_empty());
        assert!(check("<div v-if=\"a\"></div><p v-else></p>").is_empty());
        assert_eq!(check("<div></div><p></p>")[0].code, CompileErrorCode::InvalidRoot);
        assert_eq!(check("<li v-for=\"x in xs\"></li>")[0].code, CompileErrorCode::InvalidRoot);
        assert_eq!(
            check("<slot></slot>")[0].message,
            "Cannot use <slot> as component root element because it may contain multiple nodes."
        );
        let errors = check("hello");
        assert_eq!(errors[0].code, CompileErrorCode::TextOutsideRoot);
        assert_eq!(errors[1].code, CompileErrorCode::InvalidRoot);
        assert!(check("").is_empty());
    }
}
