//! Vue 2 template compiler.
//!
//! Turns the content of a `<template>` block into a render function
//! module (`var render = ...` followed by `var staticRenderFns = ...`)
//! together with tips, errors and an offset map back to the template.
//!
//! The compiler sits behind the [`TemplateCompiler`] trait so callers can
//! plug in a different implementation; [`BuiltinCompiler`] is the default.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod expression;
pub mod parser;
pub mod transforms;

pub use ast::*;
pub use error::{CompileError, CompileErrorCode, CompileResult, Tip};
pub use parser::parse_template;

use source_map::{SourceMap, Span};
use transforms::TransformContext;

/// How whitespace between elements is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WhitespaceMode {
    /// Drop whitespace-only text containing a newline and collapse runs.
    #[default]
    Condense,
    /// Keep whitespace-only text as a single space.
    Preserve,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateCompileOptions {
    /// Generate a functional render function `(_h, _vm)`.
    pub functional: bool,
    pub whitespace: WhitespaceMode,
}

/// A tip or error, with offsets relative to the template content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDiagnostic {
    pub msg: String,
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl TemplateDiagnostic {
    pub fn new(msg: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            msg: msg.into(),
            start: span.map(|s| s.start),
            end: span.map(|s| s.end),
        }
    }

    /// The span this diagnostic covers, if it has one.
    pub fn span(&self) -> Option<Span> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(Span::new(start, end.max(start))),
            (Some(start), None) => Some(Span::empty(start)),
            _ => None,
        }
    }
}

impl From<&CompileError> for TemplateDiagnostic {
    fn from(error: &CompileError) -> Self {
        Self::new(error.message.clone(), Some(error.span))
    }
}

impl From<&Tip> for TemplateDiagnostic {
    fn from(tip: &Tip) -> Self {
        Self::new(tip.message.clone(), Some(tip.span))
    }
}

/// Output of a template compilation.
#[derive(Debug, Clone, Default)]
pub struct TemplateCompileOutput {
    /// `var render = ...` followed by `var staticRenderFns = ...`.
    pub code: String,
    pub tips: Vec<TemplateDiagnostic>,
    pub errors: Vec<TemplateDiagnostic>,
    /// Offsets in `code` to offsets in the template content.
    pub source_map: Option<SourceMap>,
}

/// Compiles template content into a render function module.
pub trait TemplateCompiler: Send + Sync {
    fn compile(&self, source: &str, options: &TemplateCompileOptions) -> TemplateCompileOutput;
}

/// The template compiler shipped with this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCompiler;

impl TemplateCompiler for BuiltinCompiler {
    fn compile(&self, source: &str, options: &TemplateCompileOptions) -> TemplateCompileOutput {
        let (mut ast, mut errors) = parse_template(source);

        let mut ctx = TransformContext::new(options.whitespace);
        transforms::transform(&mut ast, &mut ctx);
        let root = transforms::validate_root(&ast, &mut ctx);

        let generated = codegen::generate(root, options.functional);
        errors.append(&mut ctx.errors);
        errors.extend(generated.errors);

        tracing::debug!(
            errors = errors.len(),
            tips = ctx.tips.len(),
            functional = options.functional,
            "compiled template"
        );

        let tips = ctx.tips.iter().map(TemplateDiagnostic::from).collect();
        if !errors.is_empty() {
            return TemplateCompileOutput {
                code: codegen::stub(options.functional),
                tips,
                errors: errors.iter().map(TemplateDiagnostic::from).collect(),
                source_map: None,
            };
        }

        TemplateCompileOutput {
            code: generated.code,
            tips,
            errors: Vec::new(),
            source_map: Some(generated.map),
        }
    }
}

/// Compile template content with the built-in compiler.
pub fn compile(source: &str, options: &TemplateCompileOptions) -> TemplateCompileOutput {
    BuiltinCompiler.compile(source, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_simple_template() {
        let output = compile("<div>Hello {{ name }}</div>", &TemplateCompileOptions::default());
        assert!(output.errors.is_empty());
        assert_eq!(
            output.code,
            "var render = function () {var _vm=this;var _h=_vm.$createElement;var _c=_vm._self._c||_h;return _c('div',[_vm._v(\"Hello \"+_vm._s(_vm.name))])}\nvar staticRenderFns = []\n"
        );
        assert!(output.source_map.is_some());
    }

    #[test]
    fn test_compile_functional() {
        let options = TemplateCompileOptions {
            functional: true,
            ..Default::default()
        };
        let output = compile("<p>{{ props.msg }}</p>", &options);
        assert!(output.errors.is_empty());
        assert!(output
            .code
            .starts_with("var render = function (_h,_vm) {var _c=_vm._c;return _c('p',"));
    }

    #[test]
    fn test_whitespace_modes() {
        let source = "<div>\n  <span>a</span>  <span>b</span>\n</div>";
        let condensed = compile(source, &TemplateCompileOptions::default());
        assert!(condensed.code.contains(r#"[_c('span',[_vm._v("a")]),_vm._v(" "),_c('span',[_vm._v("b")])]"#));

        let preserved = compile(
            "<div><span>a</span>\n<span>b</span></div>",
            &TemplateCompileOptions {
                whitespace: WhitespaceMode::Preserve,
                ..Default::default()
            },
        );
        assert!(preserved.code.contains(r#"_vm._v(" ")"#), "{}", preserved.code);
    }

    #[test]
    fn test_errors_produce_stub() {
        let output = compile("<div></div><p></p>", &TemplateCompileOptions::default());
        assert_eq!(output.errors.len(), 1);
        assert!(output.errors[0].msg.contains("exactly one root element"));
        assert!(output.code.contains("return _vm._e()}"));
        assert!(output.source_map.is_none());
    }

    #[test]
    fn test_tips_are_reported() {
        let output = compile(
            r#"<ul><Item v-for="x in xs" /></ul>"#,
            &TemplateCompileOptions::default(),
        );
        assert!(output.errors.is_empty());
        assert_eq!(output.tips.len(), 1);
        assert!(output.tips[0].msg.contains("should have explicit keys"));
        assert!(output.tips[0].start.is_some());
    }

    #[test]
    fn test_empty_template_renders_placeholder() {
        let output = compile("", &TemplateCompileOptions::default());
        assert!(output.errors.is_empty());
        assert!(output.code.contains("return _c('div')}"));
    }

    #[test]
    fn test_diagnostic_span() {
        let diagnostic = TemplateDiagnostic::new("x", Some(Span::new(3, 7)));
        assert_eq!(diagnostic.span(), Some(Span::new(3, 7)));
        assert_eq!(TemplateDiagnostic::new("y", None).span(), None);
    }
}
