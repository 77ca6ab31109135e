//! Module emission and source map stitching.
//!
//! Positions go through two hops before they reach the document. Script
//! items are sliced out of per-segment swc source files and mapped to
//! document offsets as the statements are built; render functions carry a
//! map composed from their fragment offsets through the template compiler
//! output into the template content. Emission only has to place every
//! statement map at its final offset.

use crate::assemble::{ModuleAssembly, EXPORT_TARGET};
use sfc_parser::ScriptLang;
use source_map::{CodeBuilder, SourceMap, SourceMapV3};
use std::path::Path;

/// Join the statements of `module` and close it with the default export.
pub fn emit(module: &ModuleAssembly) -> (String, SourceMap) {
    let mut builder = CodeBuilder::new();
    for statement in &module.statements {
        builder.append(&statement.code, &statement.map);
        builder.newline();
    }
    builder.push_str(&format!("export default {};", EXPORT_TARGET));
    builder.newline();
    builder.finish()
}

/// Encode an offset map over `code` as a V3 source map whose single
/// source is the whole document.
pub fn to_v3(map: &SourceMap, code: &str, document: &str, path: &str, lang: ScriptLang) -> SourceMapV3 {
    let file = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| format!("{}.{}", name, lang.extension()));
    SourceMapV3::from_source_map(map, code, document, path, file.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{ModuleStatement, StatementKind};
    use pretty_assertions::assert_eq;

    fn module() -> ModuleAssembly {
        let mut map = SourceMap::new();
        map.add(6, 20, 1);
        ModuleAssembly {
            statements: vec![
                ModuleStatement::synthesized(StatementKind::ExportTarget, "const __sfc_main = {};"),
                ModuleStatement {
                    kind: StatementKind::Script,
                    code: "const a = 1;".to_string(),
                    map,
                },
            ],
            lang: ScriptLang::Js,
            exposed: Vec::new(),
            components: Vec::new(),
        }
    }

    #[test]
    fn test_emit_places_statement_maps() {
        let (code, map) = emit(&module());
        assert_eq!(
            code,
            "const __sfc_main = {};\nconst a = 1;\nexport default __sfc_main;\n"
        );
        // `a` in the second statement.
        assert_eq!(map.to_source_offset(29), Some(20));
        assert_eq!(map.to_source_offset(3), None);
    }

    #[test]
    fn test_v3_embeds_document() {
        let document = "<script>\n\n\n         a\n</script>";
        let (code, map) = emit(&module());
        let v3 = to_v3(&map, &code, document, "src/App.vue", ScriptLang::Js);
        assert_eq!(v3.file.as_deref(), Some("App.vue.js"));
        assert_eq!(v3.sources, vec!["src/App.vue"]);
        assert_eq!(v3.sources_content, vec![document]);
        assert_eq!(v3.mappings, ";MAGS");
    }
}
