//! Extra transform passes over the assembled module.

use crate::assemble::{ModuleAssembly, ModuleStatement, StatementKind, EXPORT_TARGET};
use sfc_parser::Document;

/// What a pass can see besides the module itself.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// Path of the document as given to `compile`.
    pub path: &'a str,
    pub document: &'a Document,
}

/// A transform run after assembly and before emission, in registration
/// order. Passes may add, remove or rewrite statements; the closing
/// `export default` is not part of the statement list.
pub trait ModulePass: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, module: &mut ModuleAssembly, cx: &PassContext<'_>);
}

/// Records the document path on the component as `__file`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposeFilename;

impl ModulePass for ExposeFilename {
    fn name(&self) -> &str {
        "expose-filename"
    }

    fn apply(&self, module: &mut ModuleAssembly, cx: &PassContext<'_>) {
        let path = serde_json::Value::from(cx.path).to_string();
        module.push(ModuleStatement::synthesized(
            StatementKind::Pass,
            format!("{}.__file = {};", EXPORT_TARGET, path),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_parser::ScriptLang;

    #[test]
    fn test_expose_filename() {
        let mut module = ModuleAssembly {
            statements: Vec::new(),
            lang: ScriptLang::Js,
            exposed: Vec::new(),
            components: Vec::new(),
        };
        let document = Document::new("");
        let cx = PassContext {
            path: "src/components/\"Odd\".vue",
            document: &document,
        };
        ExposeFilename.apply(&mut module, &cx);
        assert_eq!(module.statements.len(), 1);
        assert_eq!(
            module.statements[0].code,
            r#"__sfc_main.__file = "src/components/\"Odd\".vue";"#
        );
        assert_eq!(ExposeFilename.name(), "expose-filename");
    }
}
