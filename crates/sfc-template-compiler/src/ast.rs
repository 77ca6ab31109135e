//! AST types for templates.

use indexmap::IndexMap;
use smol_str::SmolStr;
use source_map::Span;

/// The root of a parsed template.
#[derive(Debug, Clone, Default)]
pub struct TemplateAst {
    /// Child nodes of the template.
    pub children: Vec<TemplateNode>,
    /// Source span of the entire template.
    pub span: Span,
}

impl TemplateAst {
    /// Create a template AST with children.
    pub fn with_children(children: Vec<TemplateNode>, span: Span) -> Self {
        Self { children, span }
    }
}

/// A node in the template AST.
#[derive(Debug, Clone)]
pub enum TemplateNode {
    /// An element (HTML or component).
    Element(ElementNode),
    /// Text, possibly mixed with `{{ }}` interpolations.
    Text(TextNode),
    /// A comment.
    Comment(CommentNode),
    /// A conditional block (v-if/v-else-if/v-else).
    If(IfNode),
    /// A loop block (v-for).
    For(ForNode),
    /// A slot outlet (<slot>).
    SlotOutlet(SlotOutletNode),
    /// A `<template>` carrying `v-slot`.
    Template(TemplateElementNode),
}

impl TemplateNode {
    /// Get the span of this node.
    pub fn span(&self) -> Span {
        match self {
            Self::Element(n) => n.span,
            Self::Text(n) => n.span,
            Self::Comment(n) => n.span,
            Self::If(n) => n.span,
            Self::For(n) => n.span,
            Self::SlotOutlet(n) => n.span,
            Self::Template(n) => n.span,
        }
    }

    /// Whitespace-only text or a comment.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Text(text) => text.is_whitespace(),
            Self::Comment(_) => true,
            _ => false,
        }
    }
}

/// An element node (HTML element or component).
#[derive(Debug, Clone)]
pub struct ElementNode {
    /// The tag name.
    pub tag: SmolStr,
    /// Whether this is a component.
    pub is_component: bool,
    /// Static attributes.
    pub attrs: Vec<Attribute>,
    /// Remaining directives (v-show, v-model, v-html, custom ones).
    pub directives: Vec<Directive>,
    /// `:name` / `v-bind:name` bindings.
    pub props: Vec<Prop>,
    /// `@event` / `v-on:event` listeners.
    pub events: Vec<EventListener>,
    /// Child nodes.
    pub children: Vec<TemplateNode>,
    /// Named slots passed to a component.
    pub slots: IndexMap<SmolStr, SlotNode>,
    /// Self-closing tag.
    pub self_closing: bool,
    /// Source span.
    pub span: Span,
    /// Span of the tag name.
    pub tag_span: Span,
}

impl ElementNode {
    /// Get a static attribute value by name.
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    /// Get a binding by static name.
    pub fn get_prop(&self, name: &str) -> Option<&Prop> {
        self.props.iter().find(|p| !p.is_dynamic && p.name == name)
    }
}

/// A static attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute name.
    pub name: SmolStr,
    /// Attribute value.
    pub value: Option<String>,
    /// Source span.
    pub span: Span,
    /// Value span.
    pub value_span: Option<Span>,
}

/// A directive (`v-*` other than bindings, listeners and slots).
#[derive(Debug, Clone)]
pub struct Directive {
    /// Directive name (without v- prefix).
    pub name: SmolStr,
    /// The attribute name as written, e.g. `v-model.trim`.
    pub raw_name: SmolStr,
    /// Directive argument (e.g., v-bind:arg).
    pub arg: Option<DirectiveArg>,
    /// Modifiers (e.g., .prevent, .stop).
    pub modifiers: Vec<SmolStr>,
    /// Expression value.
    pub value: Option<Expression>,
    /// Source span.
    pub span: Span,
}

impl Directive {
    /// Check if a modifier is present.
    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m == name)
    }
}

/// A directive argument.
#[derive(Debug, Clone)]
pub enum DirectiveArg {
    /// Static argument (e.g., v-bind:foo).
    Static(SmolStr, Span),
    /// Dynamic argument (e.g., v-bind:[foo]).
    Dynamic(Expression),
}

/// A binding (`:name="expr"`). An empty name with `is_dynamic == false`
/// is an object spread (`v-bind="obj"`).
#[derive(Debug, Clone)]
pub struct Prop {
    /// Prop name, or the name expression text when dynamic.
    pub name: SmolStr,
    /// Prop value expression.
    pub value: Expression,
    /// Dynamic name expression (`:[name]`).
    pub name_expr: Option<Expression>,
    /// Whether this is a dynamic prop name.
    pub is_dynamic: bool,
    /// Modifiers (`.sync`, `.prop`, `.camel`).
    pub modifiers: Vec<SmolStr>,
    /// Source span.
    pub span: Span,
}

impl Prop {
    pub fn is_object_spread(&self) -> bool {
        !self.is_dynamic && self.name.is_empty()
    }

    pub fn has_modifier(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m == name)
    }
}

/// An event listener. An empty name with `is_dynamic == false` is an
/// object listener (`v-on="handlers"`).
#[derive(Debug, Clone)]
pub struct EventListener {
    /// Event name.
    pub name: SmolStr,
    /// Dynamic name expression (`@[name]`).
    pub name_expr: Option<Expression>,
    /// Handler expression.
    pub handler: Expression,
    /// Whether this is a dynamic event name.
    pub is_dynamic: bool,
    /// Modifiers.
    pub modifiers: Vec<SmolStr>,
    /// Source span.
    pub span: Span,
}

impl EventListener {
    pub fn is_object_listener(&self) -> bool {
        !self.is_dynamic && self.name.is_empty()
    }
}

/// Slot name: static, or computed from an expression.
#[derive(Debug, Clone)]
pub enum SlotName {
    Static(SmolStr),
    Dynamic(Expression),
}

/// A slot node (content for a named slot).
#[derive(Debug, Clone)]
pub struct SlotNode {
    /// Slot name.
    pub name: SlotName,
    /// Slot props expression (for scoped slots).
    pub props: Option<SlotProps>,
    /// Slot content.
    pub children: Vec<TemplateNode>,
    /// Source span.
    pub span: Span,
}

/// Slot props for scoped slots.
#[derive(Debug, Clone)]
pub struct SlotProps {
    /// The props expression or destructuring pattern.
    pub pattern: String,
    /// Source span.
    pub span: Span,
}

/// A text node. Static runs and interpolations in document order.
#[derive(Debug, Clone)]
pub struct TextNode {
    pub parts: Vec<TextPart>,
    /// Source span.
    pub span: Span,
}

impl TextNode {
    /// No interpolations and only whitespace.
    pub fn is_whitespace(&self) -> bool {
        self.parts.iter().all(|part| match part {
            TextPart::Static(text) => text.chars().all(char::is_whitespace),
            TextPart::Interpolation(_) => false,
        })
    }
}

#[derive(Debug, Clone)]
pub enum TextPart {
    Static(String),
    Interpolation(InterpolationNode),
}

/// An interpolation node ({{ expr }}).
#[derive(Debug, Clone)]
pub struct InterpolationNode {
    /// The expression.
    pub expression: Expression,
    /// Source span.
    pub span: Span,
}

/// A comment node.
#[derive(Debug, Clone)]
pub struct CommentNode {
    /// The comment content.
    pub content: String,
    /// Source span.
    pub span: Span,
}

/// A conditional node (v-if/v-else-if/v-else).
#[derive(Debug, Clone)]
pub struct IfNode {
    /// Branches of the conditional.
    pub branches: Vec<IfBranch>,
    /// Source span.
    pub span: Span,
}

/// A branch in a conditional.
#[derive(Debug, Clone)]
pub struct IfBranch {
    /// The condition (None for v-else).
    pub condition: Option<Expression>,
    /// The branch type.
    pub branch_type: IfBranchType,
    /// Child nodes.
    pub children: Vec<TemplateNode>,
    /// Source span.
    pub span: Span,
}

/// Type of if branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfBranchType {
    /// v-if
    If,
    /// v-else-if
    ElseIf,
    /// v-else
    Else,
}

/// A for loop node (v-for).
#[derive(Debug, Clone)]
pub struct ForNode {
    /// The source expression (iterable).
    pub source: Expression,
    /// The alias list as written, without surrounding parentheses.
    pub aliases: ForAlias,
    /// Names bound by the aliases.
    pub bindings: Vec<SmolStr>,
    /// Child nodes.
    pub children: Vec<TemplateNode>,
    /// The key attribute expression.
    pub key_attr: Option<Expression>,
    /// The full `v-for` value, for diagnostics.
    pub raw: String,
    /// Source span.
    pub span: Span,
}

/// An alias in a v-for expression.
#[derive(Debug, Clone)]
pub struct ForAlias {
    /// The alias name or pattern.
    pub pattern: String,
    /// Source span.
    pub span: Span,
}

/// A slot outlet (<slot>).
#[derive(Debug, Clone)]
pub struct SlotOutletNode {
    /// Slot name.
    pub name: SlotName,
    /// Slot props (passed to scoped slot).
    pub props: Vec<Prop>,
    /// Static attributes other than `name`, passed as props.
    pub attrs: Vec<Attribute>,
    /// Fallback content.
    pub fallback: Vec<TemplateNode>,
    /// Source span.
    pub span: Span,
}

/// A `<template v-slot>` element.
#[derive(Debug, Clone)]
pub struct TemplateElementNode {
    /// Directives on the template.
    pub directives: Vec<Directive>,
    /// Child nodes.
    pub children: Vec<TemplateNode>,
    /// Source span.
    pub span: Span,
}

impl TemplateElementNode {
    pub fn slot_directive(&self) -> Option<&Directive> {
        self.directives.iter().find(|d| d.name == "slot")
    }
}

/// A template expression.
#[derive(Debug, Clone)]
pub struct Expression {
    /// The raw expression text.
    pub content: String,
    /// Span of `content` within the template.
    pub span: Span,
}

impl Expression {
    /// Create a new expression.
    pub fn new(content: impl Into<String>, span: Span) -> Self {
        Self {
            content: content.into(),
            span,
        }
    }
}

/// Element types for categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// Native HTML or SVG element.
    Element,
    /// Component.
    Component,
    /// Built-in element with compile-time meaning (slot, template).
    Builtin,
}

/// Determine the element type from a tag name.
pub fn get_element_type(tag: &str) -> ElementType {
    if matches!(tag, "template" | "slot") {
        return ElementType::Builtin;
    }
    if sfc_parser::tags::is_builtin_tag(tag) {
        ElementType::Element
    } else {
        ElementType::Component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type() {
        assert_eq!(get_element_type("div"), ElementType::Element);
        assert_eq!(get_element_type("clipPath"), ElementType::Element);
        assert_eq!(get_element_type("MyButton"), ElementType::Component);
        assert_eq!(get_element_type("keep-alive"), ElementType::Component);
        assert_eq!(get_element_type("slot"), ElementType::Builtin);
    }

    #[test]
    fn test_whitespace_text() {
        let text = TextNode {
            parts: vec![TextPart::Static(" \n ".into())],
            span: Span::new(0, 3),
        };
        assert!(text.is_whitespace());
        assert!(TemplateNode::Text(text).is_blank());
    }
}
