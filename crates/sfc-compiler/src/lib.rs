//! `<script setup>` compiler for Vue 2 component documents.
//!
//! [`compile`] runs the whole pipeline on one document:
//!
//! 1. segment the document and parse both script segments
//! 2. expand the setup macros ([`macros`]), inferring a props schema from
//!    type arguments ([`infer`])
//! 3. compile the template through the configured [`TemplateCompiler`] and
//!    validate its output ([`render`])
//! 4. assemble one module around the `__sfc_main` export target
//!    ([`assemble`]), run the extra [`passes`] and emit code plus a source
//!    map ([`stitch`])
//!
//! Every call is self-contained; nothing is shared between calls except the
//! options passed in.

pub mod assemble;
pub mod error;
pub mod infer;
pub mod macros;
pub mod passes;
pub mod render;
pub mod stitch;

pub use assemble::{ModuleAssembly, ModuleStatement, StatementKind, EXPORT_TARGET};
pub use error::{CompileError, CompileResult, MacroError, MacroErrorCode};
pub use passes::{ExposeFilename, ModulePass, PassContext};

use sfc_parser::script::parse_scripts;
use sfc_parser::{ScriptLang, TemplateSegment};
use sfc_template_compiler::{
    BuiltinCompiler, TemplateCompileOptions, TemplateCompiler, TemplateDiagnostic, WhitespaceMode,
};
use source_map::SourceMapV3;
use std::fmt;
use std::sync::Arc;
use swc_common::sync::Lrc;
use tracing::{debug, instrument};

/// Options for [`compile`].
#[derive(Clone)]
pub struct CompileOptions {
    /// Compiles the template content into render functions.
    pub template_compiler: Arc<dyn TemplateCompiler>,
    /// Run in order after assembly.
    pub passes: Vec<Arc<dyn ModulePass>>,
    /// Produce a V3 source map for the generated module.
    pub source_map: bool,
}

impl CompileOptions {
    pub fn with_pass(mut self, pass: impl ModulePass + 'static) -> Self {
        self.passes.push(Arc::new(pass));
        self
    }

    pub fn with_template_compiler(mut self, compiler: impl TemplateCompiler + 'static) -> Self {
        self.template_compiler = Arc::new(compiler);
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            template_compiler: Arc::new(BuiltinCompiler),
            passes: Vec::new(),
            source_map: true,
        }
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("passes", &self.passes.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("source_map", &self.source_map)
            .finish_non_exhaustive()
    }
}

/// The generated module.
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    pub code: String,
    pub map: Option<SourceMapV3>,
    /// Dialect of the generated code, shared by both script segments.
    pub lang: ScriptLang,
}

/// Result of [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOutput {
    /// `None` when the document has nothing to compile.
    pub module: Option<GeneratedModule>,
    /// Template tips, offsets relative to the template content.
    pub tips: Vec<TemplateDiagnostic>,
    /// Template errors, offsets relative to the template content. The
    /// module still renders an empty node when these are present.
    pub errors: Vec<TemplateDiagnostic>,
    pub template: Option<TemplateSegment>,
    pub lang: ScriptLang,
}

impl CompileOutput {
    /// Whether compiling produced nothing.
    pub fn is_noop(&self) -> bool {
        self.module.is_none()
    }
}

/// Compile a component document.
///
/// Document structure, script syntax and macro misuse are fatal. Template
/// problems are reported in the output and never abort the compile.
#[instrument(skip(source, options))]
pub fn compile(source: &str, path: &str, options: &CompileOptions) -> CompileResult<CompileOutput> {
    let document = sfc_parser::parse(source)?;
    debug!(
        template = document.template.is_some(),
        script = document.script.is_some(),
        script_setup = document.script_setup.is_some(),
        "segmented document"
    );

    let cm: Lrc<swc_common::SourceMap> = Default::default();
    let scripts = parse_scripts(&cm, &document, path)?;
    let expanded = macros::expand(&scripts.script_setup, &scripts.script)?;

    let mut tips = Vec::new();
    let mut errors = Vec::new();
    let render = match &document.template {
        Some(template) => {
            let output = options.template_compiler.compile(
                &template.content,
                &TemplateCompileOptions {
                    functional: template.is_functional(),
                    whitespace: if template.is_condensed() {
                        WhitespaceMode::Condense
                    } else {
                        WhitespaceMode::Preserve
                    },
                },
            );
            debug!(
                tips = output.tips.len(),
                errors = output.errors.len(),
                "compiled template"
            );
            let functions = render::extract(&cm, path, &output, template.content_start())?;
            tips = output.tips;
            errors = output.errors;
            Some(functions)
        }
        None => None,
    };

    let assembly = assemble::assemble(assemble::AssemblyInput {
        scripts: &scripts,
        macros: expanded,
        template: document.template.as_ref(),
        render,
    })?;

    let module = match assembly {
        Some(mut assembly) => {
            let cx = PassContext {
                path,
                document: &document,
            };
            for pass in &options.passes {
                debug!(pass = pass.name(), "running pass");
                pass.apply(&mut assembly, &cx);
            }

            let (code, map) = stitch::emit(&assembly);
            let map = options
                .source_map
                .then(|| stitch::to_v3(&map, &code, source, path, assembly.lang));
            debug!(bytes = code.len(), "emitted module");
            Some(GeneratedModule {
                code,
                map,
                lang: assembly.lang,
            })
        }
        None => None,
    };

    Ok(CompileOutput {
        module,
        tips,
        errors,
        template: document.template,
        lang: scripts.lang,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_template_compiler::TemplateCompileOutput;

    fn module(source: &str) -> String {
        compile(source, "App.vue", &CompileOptions::default())
            .unwrap()
            .module
            .unwrap()
            .code
    }

    #[test]
    fn test_setup_exposes_count_and_attaches_render() {
        let code = module("<template><div>{{ count }}</div></template>\n<script setup>\nconst count = 0\n</script>\n");
        assert_eq!(
            code,
            "const __sfc_main = {};\n\
             __sfc_main.setup = (__props, __ctx) => {\n  const count = 0;\n  return { count };\n};\n\
             function render() {var _vm=this;var _h=_vm.$createElement;var _c=_vm._self._c||_h;return _c('div',[_vm._v(_vm._s(_vm.count))])}\n\
             __sfc_main.render = __sfc_main.render || render;\n\
             __sfc_main.staticRenderFns = [];\n\
             export default __sfc_main;\n"
        );
        assert!(!code.contains(".props"));
        assert!(!code.contains(".components"));
    }

    #[test]
    fn test_type_based_props_without_template() {
        let code = module("<script setup lang=\"ts\">\nconst props = defineProps<{msg: string}>()\n</script>\n");
        assert_eq!(
            code,
            "const __sfc_main = {};\n\
             __sfc_main.props = {\n  msg: { required: true, type: String }\n};\n\
             __sfc_main.setup = (__props, __ctx) => {\n  const props = __props;\n  return {};\n};\n\
             export default __sfc_main;\n"
        );
    }

    #[test]
    fn test_mismatched_languages_are_rejected() {
        let err = compile(
            "<script lang=\"ts\">\nexport default {}\n</script>\n<script setup>\ndefineProps(['a'])\ndefineProps(['b'])\n</script>\n",
            "App.vue",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.code(), "language-mismatch");
    }

    #[test]
    fn test_script_without_default_export_is_noop() {
        let output = compile(
            "<script>\nconst helper = 1\n</script>\n",
            "App.vue",
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(output.is_noop());
        assert!(output.template.is_none());
    }

    #[test]
    fn test_duplicate_define_props() {
        let err = compile(
            "<script setup>\ndefineProps({ a: String })\ndefineProps({ a: String })\n</script>\n",
            "App.vue",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "duplicate defineProps() call");
        // Second call starts after "<script setup>\n" and the first line.
        assert_eq!(err.span().map(|s| s.start), Some(42));
    }

    #[test]
    fn test_functional_template() {
        let code = module("<template functional><p>{{ props.msg }}</p></template>\n");
        assert!(code.contains("function render(_h,_vm) {var _c=_vm._c;"));
        assert!(code.contains("__sfc_main.functional = true;\n"));
    }

    #[test]
    fn test_template_errors_are_reported() {
        let output = compile(
            "<template><div></div><p></p></template>\n",
            "App.vue",
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(output.errors.len(), 1);
        let code = output.module.unwrap().code;
        assert!(code.contains("return _vm._e()}"));
    }

    #[test]
    fn test_expose_filename_pass() {
        let options = CompileOptions::default().with_pass(ExposeFilename);
        let code = compile("<script>\nexport default {}\n</script>\n", "src/A.vue", &options)
            .unwrap()
            .module
            .unwrap()
            .code;
        assert_eq!(
            code,
            "const __sfc_main = {};\n__sfc_main.__file = \"src/A.vue\";\nexport default __sfc_main;\n"
        );
    }

    #[test]
    fn test_hoisting_and_components() {
        let code = module(
            "<template><Child :value=\"value\" /></template>\n<script setup>\nimport Child from './Child.vue'\nconst value = 1\n</script>\n",
        );
        let lines: Vec<&str> = code.lines().collect();
        assert_eq!(lines[0], "import Child from './Child.vue';");
        assert_eq!(lines[1], "const __sfc_main = {};");
        assert!(code.contains("return { value };"));
        assert!(code.contains("__sfc_main.components = Object.assign({ Child }, __sfc_main.components);"));
    }

    struct BrokenCompiler;

    impl TemplateCompiler for BrokenCompiler {
        fn compile(&self, _: &str, _: &TemplateCompileOptions) -> TemplateCompileOutput {
            TemplateCompileOutput {
                code: "module.exports = {}".to_string(),
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_custom_template_compiler_contract() {
        let options = CompileOptions::default().with_template_compiler(BrokenCompiler);
        let err = compile("<template><div /></template>\n", "App.vue", &options).unwrap_err();
        assert!(matches!(err, CompileError::RenderContract { .. }));
    }

    #[test]
    fn test_source_map_points_into_document() {
        let source = "<template><div>{{ count }}</div></template>\n<script setup>\nconst count = 0\n</script>\n";
        let output = compile(source, "App.vue", &CompileOptions::default()).unwrap();
        let map = output.module.unwrap().map.unwrap();
        assert_eq!(map.sources, vec!["App.vue"]);
        assert_eq!(map.sources_content, vec![source]);
        assert!(!map.segments().unwrap().is_empty());

        let options = CompileOptions {
            source_map: false,
            ..Default::default()
        };
        assert!(compile(source, "App.vue", &options).unwrap().module.unwrap().map.is_none());
    }
}
