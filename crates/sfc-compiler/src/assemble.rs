//! Module assembly.
//!
//! Merges the module script, the expanded setup script and the render
//! functions into an ordered list of statements around a single export
//! target:
//!
//! ```text
//! <hoisted setup imports, exports and type declarations>
//! <module script, `export default X` rewritten to `const __sfc_main = X;`>
//! __sfc_main.props = { ... };
//! __sfc_main.setup = (__props, __ctx) => { ...; return { ... }; };
//! __sfc_main.components = Object.assign({ ... }, __sfc_main.components);
//! function render(...) { ... }
//! __sfc_main.render = __sfc_main.render || render;
//! __sfc_main.staticRenderFns = [];
//! ```
//!
//! Statement text is sliced from the original segments, so every verbatim
//! piece keeps a mapping to its document offset.

use crate::error::{CompileError, CompileResult};
use crate::infer::PropSchemaEntry;
use crate::macros::{ExpandedItem, MacroResult, PropsDefinition, Replacement, CONTEXT_PARAM, PROPS_PARAM};
use crate::render::{Fragment, RenderFunctions};
use indexmap::IndexSet;
use sfc_parser::identifiers::declarations;
use sfc_parser::tags::{camelize, capitalize};
use sfc_parser::{ParsedScript, ParsedScripts, ScriptLang, TemplateSegment};
use source_map::{CodeBuilder, SourceMap};
use swc_common::Spanned;
use swc_ecma_ast::*;

/// Name of the synthesized component options binding.
pub const EXPORT_TARGET: &str = "__sfc_main";

/// What a statement of the generated module is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// Import, export or type declaration moved out of the setup script.
    Hoisted,
    /// A module script statement.
    Script,
    /// The `const __sfc_main = ...` binding.
    ExportTarget,
    Props,
    Setup,
    Components,
    /// `function render(...) { ... }`
    RenderFunction,
    Render,
    StaticRenderFns,
    Functional,
    /// Added by a [`ModulePass`](crate::passes::ModulePass).
    Pass,
}

/// One top-level statement of the generated module.
#[derive(Debug, Clone)]
pub struct ModuleStatement {
    pub kind: StatementKind,
    pub code: String,
    /// Offsets in `code` to document offsets.
    pub map: SourceMap,
}

impl ModuleStatement {
    /// A statement with no counterpart in the document.
    pub fn synthesized(kind: StatementKind, code: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            map: SourceMap::new(),
        }
    }

    fn built(kind: StatementKind, builder: CodeBuilder) -> Self {
        let (code, map) = builder.finish();
        Self { kind, code, map }
    }
}

/// The generated module before emission.
#[derive(Debug, Clone)]
pub struct ModuleAssembly {
    pub statements: Vec<ModuleStatement>,
    pub lang: ScriptLang,
    /// Setup bindings returned to the template, in declaration order.
    pub exposed: Vec<String>,
    /// Setup bindings registered as local components.
    pub components: Vec<String>,
}

impl ModuleAssembly {
    pub fn push(&mut self, statement: ModuleStatement) {
        self.statements.push(statement);
    }

    pub fn has(&self, kind: StatementKind) -> bool {
        self.statements.iter().any(|s| s.kind == kind)
    }
}

/// Everything the assembler consumes.
pub struct AssemblyInput<'a> {
    pub scripts: &'a ParsedScripts,
    pub macros: MacroResult<'a>,
    pub template: Option<&'a TemplateSegment>,
    pub render: Option<RenderFunctions>,
}

/// Assemble the module. Returns `None` when the document has nothing to
/// compile: no default export, props, setup, components or render.
pub fn assemble(input: AssemblyInput<'_>) -> CompileResult<Option<ModuleAssembly>> {
    let AssemblyInput {
        scripts,
        macros,
        template,
        render,
    } = input;
    let setup = &scripts.script_setup;
    let script = &scripts.script;

    let mut statements = Vec::new();
    let mut body = Vec::new();
    for expanded in &macros.items {
        if is_hoisted(setup, expanded.item)? {
            statements.push(statement(StatementKind::Hoisted, setup, expanded));
        } else {
            body.push(expanded);
        }
    }

    let mut has_default_export = false;
    for item in script.items() {
        let default = match item {
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(export)) => Some(export.expr.span()),
            ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(export)) => match &export.decl {
                DefaultDecl::Class(class) => Some(class.span()),
                DefaultDecl::Fn(function) => Some(function.span()),
                DefaultDecl::TsInterfaceDecl(_) => None,
            },
            _ => None,
        };
        match default {
            Some(span) => {
                has_default_export = true;
                let mut builder = CodeBuilder::new();
                builder.push_str(&format!("const {} = ", EXPORT_TARGET));
                verbatim(&mut builder, script, span);
                builder.push(';');
                statements.push(ModuleStatement::built(StatementKind::ExportTarget, builder));
            }
            None => statements.push(statement(
                StatementKind::Script,
                script,
                &ExpandedItem {
                    item,
                    replacements: Vec::new(),
                },
            )),
        }
    }
    if !has_default_export {
        statements.push(ModuleStatement::synthesized(
            StatementKind::ExportTarget,
            format!("const {} = {{}};", EXPORT_TARGET),
        ));
    }

    let declared = declarations(setup.items());
    let exposed: Vec<String> = match template {
        Some(template) => declared
            .iter()
            .filter(|name| template.identifiers.contains(*name))
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    let components: Vec<String> = match template {
        Some(template) => declared
            .iter()
            .filter(|name| is_component(name, &template.components))
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    let mut attached = false;
    if let Some(props) = &macros.props {
        statements.push(props_statement(setup, props));
        attached = true;
    }
    if !macros.items.is_empty() {
        statements.push(setup_statement(setup, &body, &exposed, macros.expose));
        attached = true;
    }
    if !components.is_empty() {
        statements.push(ModuleStatement::synthesized(
            StatementKind::Components,
            format!(
                "{0}.components = Object.assign({{ {1} }}, {0}.components);",
                EXPORT_TARGET,
                components.join(", ")
            ),
        ));
        attached = true;
    }
    if let Some(render) = render {
        statements.push(ModuleStatement {
            kind: StatementKind::RenderFunction,
            code: render.render.code,
            map: render.render.map,
        });
        statements.push(ModuleStatement::synthesized(
            StatementKind::Render,
            format!("{0}.render = {0}.render || render;", EXPORT_TARGET),
        ));
        statements.push(assignment(
            StatementKind::StaticRenderFns,
            "staticRenderFns",
            &render.static_render_fns,
        ));
        if template.is_some_and(TemplateSegment::is_functional) {
            statements.push(ModuleStatement::synthesized(
                StatementKind::Functional,
                format!("{}.functional = true;", EXPORT_TARGET),
            ));
        }
        attached = true;
    }

    if !attached && !has_default_export {
        tracing::debug!("nothing to assemble");
        return Ok(None);
    }

    tracing::debug!(
        statements = statements.len(),
        exposed = exposed.len(),
        components = components.len(),
        "assembled module"
    );
    Ok(Some(ModuleAssembly {
        statements,
        lang: scripts.lang,
        exposed,
        components,
    }))
}

/// Whether a setup item moves to the top of the module.
fn is_hoisted(setup: &ParsedScript, item: &ModuleItem) -> CompileResult<bool> {
    Ok(match item {
        ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultDecl(ExportDefaultDecl { span, .. }))
        | ModuleItem::ModuleDecl(ModuleDecl::ExportDefaultExpr(ExportDefaultExpr { span, .. })) => {
            return Err(CompileError::Assembly {
                message: "<script setup> cannot contain a default export".to_string(),
                span: setup.document_span(*span),
            });
        }
        ModuleItem::ModuleDecl(_) => true,
        ModuleItem::Stmt(Stmt::Decl(decl)) => match decl {
            Decl::TsInterface(_) | Decl::TsTypeAlias(_) | Decl::TsEnum(_) | Decl::TsModule(_) => true,
            Decl::Fn(function) => function.declare,
            _ => false,
        },
        _ => false,
    })
}

fn is_component(name: &str, components: &IndexSet<String>) -> bool {
    let camel = camelize(name);
    components.contains(name) || components.contains(&camel) || components.contains(&capitalize(&camel))
}

/// A top-level item with its macro replacements applied.
fn statement(kind: StatementKind, script: &ParsedScript, expanded: &ExpandedItem<'_>) -> ModuleStatement {
    let mut builder = CodeBuilder::new();
    write_item(&mut builder, script, expanded.item.span(), &expanded.replacements);
    terminate(&mut builder, expanded.item);
    ModuleStatement::built(kind, builder)
}

fn write_item(builder: &mut CodeBuilder, script: &ParsedScript, span: swc_common::Span, replacements: &[Replacement]) {
    let mut cursor = span.lo;
    for replacement in replacements {
        verbatim(builder, script, swc_common::Span::new(cursor, replacement.span.lo));
        let target = script.document_span(replacement.span);
        builder.push_with_mapping(&replacement.text, target.start, target.len());
        cursor = replacement.span.hi;
    }
    verbatim(builder, script, swc_common::Span::new(cursor, span.hi));
}

fn verbatim(builder: &mut CodeBuilder, script: &ParsedScript, span: swc_common::Span) {
    builder.push_mapped(script.text(span), script.document_span(span).start);
}

/// Ends a statement with `;` unless it already has one or ends in a block.
/// An expression ending in `}` still needs it, or a following line that
/// opens with `(` or `[` would continue it.
fn terminate(builder: &mut CodeBuilder, item: &ModuleItem) {
    if !builder.code().trim_end().ends_with(';') && !is_block_bodied(item) {
        builder.push(';');
    }
}

fn is_block_bodied(item: &ModuleItem) -> bool {
    let decl = match item {
        ModuleItem::Stmt(Stmt::Decl(decl)) => decl,
        ModuleItem::ModuleDecl(ModuleDecl::ExportDecl(export)) => &export.decl,
        ModuleItem::Stmt(stmt) => {
            return matches!(
                stmt,
                Stmt::Block(_)
                    | Stmt::If(_)
                    | Stmt::For(_)
                    | Stmt::ForIn(_)
                    | Stmt::ForOf(_)
                    | Stmt::While(_)
                    | Stmt::Try(_)
                    | Stmt::Switch(_)
                    | Stmt::Labeled(_)
                    | Stmt::With(_)
                    | Stmt::Empty(_)
            )
        }
        ModuleItem::ModuleDecl(_) => return false,
    };
    match decl {
        Decl::Fn(function) => function.function.body.is_some(),
        Decl::Class(_) | Decl::TsInterface(_) | Decl::TsEnum(_) | Decl::TsModule(_) => true,
        _ => false,
    }
}

fn assignment(kind: StatementKind, property: &str, value: &Fragment) -> ModuleStatement {
    let mut builder = CodeBuilder::new();
    builder.push_str(&format!("{}.{} = ", EXPORT_TARGET, property));
    builder.append(&value.code, &value.map);
    builder.push(';');
    ModuleStatement::built(kind, builder)
}

fn props_statement(setup: &ParsedScript, props: &PropsDefinition<'_>) -> ModuleStatement {
    let mut builder = CodeBuilder::new();
    builder.push_str(&format!("{}.props = ", EXPORT_TARGET));
    match props {
        PropsDefinition::Runtime(expr) => verbatim(&mut builder, setup, expr.span()),
        PropsDefinition::Schema(entries) => {
            builder.push_str("{\n");
            for (i, entry) in entries.iter().enumerate() {
                if i > 0 {
                    builder.push_str(",\n");
                }
                builder.push_str("  ");
                schema_entry(&mut builder, setup, entry);
            }
            builder.push_str("\n}");
        }
    }
    builder.push(';');
    ModuleStatement::built(StatementKind::Props, builder)
}

fn schema_entry(builder: &mut CodeBuilder, setup: &ParsedScript, entry: &PropSchemaEntry<'_>) {
    if entry.quoted {
        builder.push_str(&serde_json::Value::from(entry.key.as_str()).to_string());
    } else {
        builder.push_str(&entry.key);
    }
    builder.push_str(": ");

    if entry.is_unchecked() && entry.default.is_none() {
        builder.push_str("null");
        return;
    }
    builder.push_str(&format!(
        "{{ required: {}, type: {}",
        entry.required,
        entry.type_code()
    ));
    if let Some(default) = entry.default {
        builder.push_str(", default: ");
        verbatim(builder, setup, default.span());
    }
    builder.push_str(" }");
}

fn setup_statement(
    setup: &ParsedScript,
    body: &[&ExpandedItem<'_>],
    exposed: &[String],
    expose: Option<&Expr>,
) -> ModuleStatement {
    let mut builder = CodeBuilder::new();
    builder.push_str(&format!(
        "{}.setup = ({}, {}) => {{\n",
        EXPORT_TARGET, PROPS_PARAM, CONTEXT_PARAM
    ));
    for expanded in body {
        builder.push_str("  ");
        write_item(&mut builder, setup, expanded.item.span(), &expanded.replacements);
        terminate(&mut builder, expanded.item);
        builder.newline();
    }

    builder.push_str("  return {");
    let mut first = true;
    let mut separator = |builder: &mut CodeBuilder| {
        builder.push_str(if first { " " } else { ", " });
        first = false;
    };
    for name in exposed {
        separator(&mut builder);
        builder.push_str(name);
    }
    match expose {
        Some(Expr::Object(object)) => {
            for prop in &object.props {
                separator(&mut builder);
                verbatim(&mut builder, setup, prop.span());
            }
        }
        Some(other) => {
            separator(&mut builder);
            builder.push_str("...");
            verbatim(&mut builder, setup, other.span());
        }
        None => {}
    }
    if !first {
        builder.push(' ');
    }
    builder.push_str("};\n};");
    ModuleStatement::built(StatementKind::Setup, builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::expand;
    use pretty_assertions::assert_eq;
    use sfc_parser::script::parse_scripts;
    use swc_common::sync::Lrc;

    fn assembled(source: &str) -> CompileResult<Option<ModuleAssembly>> {
        let document = sfc_parser::parse(source).unwrap();
        let cm: Lrc<swc_common::SourceMap> = Default::default();
        let scripts = parse_scripts(&cm, &document, "Test.vue").unwrap();
        let macros = expand(&scripts.script_setup, &scripts.script).unwrap();
        assemble(AssemblyInput {
            scripts: &scripts,
            macros,
            template: document.template.as_ref(),
            render: None,
        })
    }

    fn code(source: &str) -> Vec<(StatementKind, String)> {
        assembled(source)
            .unwrap()
            .unwrap()
            .statements
            .into_iter()
            .map(|s| (s.kind, s.code))
            .collect()
    }

    #[test]
    fn test_setup_exposes_template_bindings() {
        let statements = code(
            "<template><div @click=\"inc\">{{ count }}</div></template>\n<script setup>\nimport { ref } from 'vue'\nconst count = ref(0)\nconst hidden = 1\nfunction inc() { count.value++ }\n</script>",
        );
        assert_eq!(
            statements,
            vec![
                (StatementKind::Hoisted, "import { ref } from 'vue';".to_string()),
                (StatementKind::ExportTarget, "const __sfc_main = {};".to_string()),
                (
                    StatementKind::Setup,
                    "__sfc_main.setup = (__props, __ctx) => {\n  const count = ref(0);\n  const hidden = 1;\n  function inc() { count.value++ }\n  return { count, inc };\n};".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_default_export_becomes_target() {
        let statements = code(
            "<script>\nimport Foo from './Foo'\nexport default { name: 'A' }\n</script>\n<script setup>\nconst a = 1\n</script>",
        );
        assert_eq!(statements[0].1, "import Foo from './Foo';");
        assert_eq!(
            statements[1],
            (StatementKind::ExportTarget, "const __sfc_main = { name: 'A' };".to_string())
        );
        assert!(statements[2].1.contains("return {};"));
    }

    #[test]
    fn test_components_are_registered() {
        let assembly = assembled(
            "<template><div><my-button /><BaseIcon /></div></template>\n<script setup>\nimport MyButton from './MyButton.vue'\nimport BaseIcon from './BaseIcon.vue'\nimport other from './other'\n</script>",
        )
        .unwrap()
        .unwrap();
        assert_eq!(assembly.components, vec!["MyButton", "BaseIcon"]);
        assert_eq!(
            assembly.statements.last().unwrap().code,
            "__sfc_main.components = Object.assign({ MyButton, BaseIcon }, __sfc_main.components);"
        );
    }

    #[test]
    fn test_import_only_setup_still_exposes() {
        let statements = code(
            "<template><p>{{ fmt(x) }}</p></template>\n<script setup>\nimport { fmt } from './util'\n</script>",
        );
        assert_eq!(
            statements,
            vec![
                (StatementKind::Hoisted, "import { fmt } from './util';".to_string()),
                (StatementKind::ExportTarget, "const __sfc_main = {};".to_string()),
                (
                    StatementKind::Setup,
                    "__sfc_main.setup = (__props, __ctx) => {\n  return { fmt };\n};".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_imports_with_expose_only() {
        let statements = code("<script setup>\nimport { api } from './api'\ndefineExpose({ api })\n</script>");
        assert_eq!(statements[2].0, StatementKind::Setup);
        assert!(statements[2].1.ends_with("  return { api };\n};"));
    }

    #[test]
    fn test_statements_ending_in_braces_are_terminated() {
        let statements = code(
            "<template><p>{{ f }}</p></template>\n<script setup>\nconst f = () => {}\nconst g = function () {}\nclass B {}\nif (f) {}\n</script>",
        );
        assert_eq!(
            statements[1].1,
            "__sfc_main.setup = (__props, __ctx) => {\n  const f = () => {};\n  const g = function () {};\n  class B {}\n  if (f) {}\n  return { f };\n};"
        );
    }

    #[test]
    fn test_schema_props_with_defaults() {
        let statements = code(
            "<script setup lang=\"ts\">\ninterface Props { msg?: string; 'data-id': number; extra }\nconst props = withDefaults(defineProps<Props>(), { msg: 'hi' })\n</script>",
        );
        assert_eq!(statements[0].0, StatementKind::Hoisted);
        assert_eq!(
            statements[2].1,
            "__sfc_main.props = {\n  msg: { required: false, type: String, default: 'hi' },\n  \"data-id\": { required: true, type: Number },\n  extra: null\n};"
        );
        assert!(statements[3].1.contains("  const props = __props;\n"));
    }

    #[test]
    fn test_expose_argument_is_appended() {
        let statements = code(
            "<template><p>{{ a }}</p></template>\n<script setup>\nconst a = 1\nconst b = 2\ndefineExpose({ b, c: 3 })\n</script>",
        );
        assert!(statements[1].1.ends_with("  return { a, b, c: 3 };\n};"));

        let statements = code("<script setup>\nconst api = {}\ndefineExpose(api)\n</script>");
        assert!(statements[1].1.ends_with("  return { ...api };\n};"));
    }

    #[test]
    fn test_emits_replacement_is_mapped() {
        let source = "<script setup>\nconst emit = defineEmits(['change'])\n</script>";
        let assembly = assembled(source).unwrap().unwrap();
        let setup = &assembly.statements[1];
        let at = setup.code.find("__ctx.emit").unwrap() as u32;
        let target = setup.map.to_source_offset(at).unwrap() as usize;
        assert!(source[target..].starts_with("defineEmits"));
    }

    #[test]
    fn test_nothing_to_compile() {
        assert!(assembled("<script>\nconst a = 1\n</script>").unwrap().is_none());
    }

    #[test]
    fn test_default_export_in_setup_is_rejected() {
        let err = assembled("<script setup>\nexport default {}\n</script>").unwrap_err();
        assert_eq!(err.code(), "assembly");
        assert_eq!(err.span().map(|s| s.start), Some(15));
    }
}
