//! Render function extraction.
//!
//! The template compiler hands back a small script whose first two
//! statements declare `render` and `staticRenderFns`. Both are validated
//! here and cut out as standalone fragments so the assembler can place
//! them in the generated module.

use crate::error::{CompileError, CompileResult};
use sfc_parser::script::parse_script;
use sfc_parser::{ParsedScript, ScriptLang};
use sfc_template_compiler::TemplateCompileOutput;
use source_map::{CodeBuilder, SourceMap};
use swc_common::sync::Lrc;
use swc_ecma_ast::*;

/// A piece of generated code with a map into the document.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    pub code: String,
    pub map: SourceMap,
}

/// The two declarations every render module starts with.
#[derive(Debug, Clone)]
pub struct RenderFunctions {
    /// `function render(<params>) <body>`
    pub render: Fragment,
    /// The `staticRenderFns` array literal.
    pub static_render_fns: Fragment,
}

/// Validate the template compiler output and extract its render
/// declarations. `content_start` is the document offset of the template
/// content the output was compiled from.
pub fn extract(
    cm: &Lrc<swc_common::SourceMap>,
    path: &str,
    output: &TemplateCompileOutput,
    content_start: u32,
) -> CompileResult<RenderFunctions> {
    let script = parse_script(cm, &format!("{}?render", path), &output.code, 0, ScriptLang::Js)
        .map_err(|err| CompileError::render_contract(err.message))?;

    // Code offsets of the render module to document offsets.
    let template_map = output
        .source_map
        .as_ref()
        .map(|map| map.shift_source(content_start))
        .unwrap_or_default();

    let mut items = script.items().iter();
    let function = match declarator(items.next(), "render")? {
        Expr::Fn(FnExpr { function, .. }) => function,
        _ => return Err(CompileError::render_contract("`render` must be initialized with a function expression")),
    };
    let Some(body) = &function.body else {
        return Err(CompileError::render_contract("`render` has no body"));
    };
    let array = match declarator(items.next(), "staticRenderFns")? {
        Expr::Array(array) => array,
        _ => return Err(CompileError::render_contract("`staticRenderFns` must be initialized with an array literal")),
    };

    let mut builder = CodeBuilder::new();
    builder.push_str("function render(");
    if let (Some(first), Some(last)) = (function.params.first(), function.params.last()) {
        mapped(&mut builder, &script, swc_common::Span::new(first.span.lo, last.span.hi));
    }
    builder.push_str(") ");
    mapped(&mut builder, &script, body.span);
    let render = fragment(builder, &template_map);

    let mut builder = CodeBuilder::new();
    mapped(&mut builder, &script, array.span);
    let static_render_fns = fragment(builder, &template_map);

    tracing::trace!(render = %render.code.len(), "extracted render function");
    Ok(RenderFunctions {
        render,
        static_render_fns,
    })
}

/// The initializer of a single-declarator variable statement named `name`.
fn declarator<'a>(item: Option<&'a ModuleItem>, name: &str) -> CompileResult<&'a Expr> {
    let expected = || CompileError::render_contract(format!("expected a `{}` declaration", name));

    let Some(ModuleItem::Stmt(Stmt::Decl(Decl::Var(var)))) = item else {
        return Err(expected());
    };
    let [decl] = var.decls.as_slice() else {
        return Err(CompileError::render_contract(format!(
            "`{}` must be the only declarator of its statement",
            name
        )));
    };
    match (&decl.name, decl.init.as_deref()) {
        (Pat::Ident(ident), Some(init)) if &*ident.id.sym == name => Ok(init),
        _ => Err(expected()),
    }
}

fn mapped(builder: &mut CodeBuilder, script: &ParsedScript, span: swc_common::Span) {
    builder.push_mapped(script.text(span), script.local_span(span).start);
}

fn fragment(builder: CodeBuilder, template_map: &SourceMap) -> Fragment {
    let (code, map) = builder.finish();
    Fragment {
        map: map.compose(template_map),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_template_compiler::{compile, TemplateCompileOptions};

    fn run(code: &str) -> CompileResult<RenderFunctions> {
        let cm: Lrc<swc_common::SourceMap> = Default::default();
        let output = TemplateCompileOutput {
            code: code.to_string(),
            ..Default::default()
        };
        extract(&cm, "App.vue", &output, 0)
    }

    #[test]
    fn test_extract_builtin_output() {
        let cm: Lrc<swc_common::SourceMap> = Default::default();
        let output = compile("<div>{{ count }}</div>", &TemplateCompileOptions::default());
        let fns = extract(&cm, "App.vue", &output, 10).unwrap();

        assert!(fns.render.code.starts_with("function render() {var _vm=this;"));
        assert!(fns.render.code.ends_with("return _c('div',[_vm._v(_vm._s(_vm.count))])}"));
        assert_eq!(fns.static_render_fns.code, "[]");

        // `count` sits at offset 8 of the template content.
        let at = fns.render.code.find("_vm.count").unwrap() as u32 + 4;
        let source = fns.render.map.to_source_offset(at).unwrap();
        assert!((18..23).contains(&source), "{}", source);
    }

    #[test]
    fn test_functional_params_are_kept() {
        let fns = run("var render = function (_h,_vm) {return _vm._e()}\nvar staticRenderFns = []").unwrap();
        assert_eq!(fns.render.code, "function render(_h,_vm) {return _vm._e()}");
    }

    #[test]
    fn test_missing_render() {
        let err = run("var staticRenderFns = []").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid render function module: expected a `render` declaration"
        );
    }

    #[test]
    fn test_render_must_be_function() {
        let err = run("var render = 1\nvar staticRenderFns = []").unwrap_err();
        assert_eq!(err.code(), "render-contract");
    }

    #[test]
    fn test_single_declarator_required() {
        let err = run("var render = function () {}, x = 1\nvar staticRenderFns = []").unwrap_err();
        assert!(err.to_string().contains("only declarator"));
    }

    #[test]
    fn test_static_render_fns_must_be_array() {
        let err = run("var render = function () {}\nvar staticRenderFns = null").unwrap_err();
        assert!(err.to_string().contains("array literal"));

        let err = run("var render = function () {}").unwrap_err();
        assert!(err.to_string().contains("`staticRenderFns`"));
    }

    #[test]
    fn test_unparsable_output() {
        assert_eq!(run("var render = function (").unwrap_err().code(), "render-contract");
    }
}
