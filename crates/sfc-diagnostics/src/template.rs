//! Template diagnostics.

use crate::{Diagnostic, DiagnosticCode};
use sfc_compiler::CompileOutput;
use sfc_template_compiler::TemplateDiagnostic;

/// Tips and errors of the template compiler, tips first, with spans moved
/// from the template content into the document.
pub fn template_diagnostics(output: &CompileOutput) -> Vec<Diagnostic> {
    let content_start = output
        .template
        .as_ref()
        .map(|template| template.content_start())
        .unwrap_or_default();

    let tips = output.tips.iter().map(|tip| {
        Diagnostic::warning(
            tip.msg.clone(),
            document_span(tip, content_start),
            DiagnosticCode::TemplateTip,
        )
    });
    let errors = output.errors.iter().map(|error| {
        Diagnostic::error(
            error.msg.clone(),
            document_span(error, content_start),
            DiagnosticCode::TemplateError,
        )
    });
    tips.chain(errors).collect()
}

pub(crate) fn document_span(diagnostic: &TemplateDiagnostic, content_start: u32) -> Option<source_map::Span> {
    diagnostic.span().map(|span| span.shift(content_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use pretty_assertions::assert_eq;
    use sfc_compiler::{compile, CompileOptions};

    #[test]
    fn test_template_diagnostics_are_shifted() {
        let source = "<script>\nexport default {}\n</script>\n<template><div></div><p></p></template>\n";
        let output = compile(source, "App.vue", &CompileOptions::default()).unwrap();
        let diagnostics = template_diagnostics(&output);
        assert_eq!(diagnostics.len(), 1);

        let error = &diagnostics[0];
        assert_eq!(error.severity, Severity::Error);
        assert_eq!(error.code, DiagnosticCode::TemplateError);
        let span = error.span.unwrap();
        assert!(span.start >= 37, "{:?}", span);
        assert!(span.end as usize <= source.len());
    }

    #[test]
    fn test_tips_are_warnings() {
        let source = "<template><ul><Item v-for=\"x in xs\" /></ul></template>\n";
        let output = compile(source, "App.vue", &CompileOptions::default()).unwrap();
        let diagnostics = template_diagnostics(&output);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert!(diagnostics[0].span.unwrap().start >= 10);
    }

    #[test]
    fn test_no_template() {
        let output = compile("<script>\nexport default {}\n</script>", "App.vue", &CompileOptions::default()).unwrap();
        assert!(template_diagnostics(&output).is_empty());
    }
}
