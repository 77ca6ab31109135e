//! Diagnostics for compiled component documents.
//!
//! Flattens everything a compile reports into [`Diagnostic`]s with
//! document-relative spans:
//! - template tips as warnings and template errors as errors ([`template`])
//! - fatal compile errors
//!
//! [`report`] renders the same information as `miette` reports with code
//! frames.

pub mod report;
pub mod template;

pub use report::{CompileErrorReport, TemplateErrorFrame, TemplateErrorReport};
pub use template::template_diagnostics;

use sfc_compiler::CompileError;
use source_map::{LineCol, LineIndex, Span};

/// A diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The diagnostic message.
    pub message: String,
    /// Document-relative span, when the diagnostic points at source text.
    pub span: Option<Span>,
    /// The severity level.
    pub severity: Severity,
    /// The diagnostic code.
    pub code: DiagnosticCode,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Option<Span>, code: DiagnosticCode) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Error,
            code,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Option<Span>, code: DiagnosticCode) -> Self {
        Self {
            message: message.into(),
            span,
            severity: Severity::Warning,
            code,
        }
    }

    /// A fatal compile error as an error diagnostic.
    pub fn from_compile_error(error: &CompileError) -> Self {
        Self::error(error.to_string(), error.span(), DiagnosticCode::Compile(error.code()))
    }

    /// Zero-based line and column of the span start in `source`.
    pub fn line_col(&self, source: &str) -> Option<LineCol> {
        let span = self.span?;
        Some(LineIndex::new(source).line_col(span.start.min(source.len() as u32)))
    }
}

/// Diagnostic severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// The document did not compile, or its template is broken.
    Error,
    /// A hint from the template compiler.
    Warning,
}

impl Severity {
    /// Get the severity as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

/// Diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// A template compiler tip.
    TemplateTip,
    /// A template compiler error.
    TemplateError,
    /// A fatal compile error, with its own code.
    Compile(&'static str),
}

impl DiagnosticCode {
    /// Get the code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TemplateTip => "template-tip",
            Self::TemplateError => "template-error",
            Self::Compile(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sfc_compiler::{compile, CompileOptions};

    #[test]
    fn test_compile_error_diagnostic() {
        let source = "<script setup>\nconst a = 1\nawait a\n</script>\n";
        let err = compile(source, "App.vue", &CompileOptions::default()).unwrap_err();
        let diagnostic = Diagnostic::from_compile_error(&err);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.code.as_str(), "top-level-await");
        assert_eq!(diagnostic.message, "top-level await is not supported in Vue 2");
        assert_eq!(diagnostic.line_col(source), Some(LineCol::new(2, 0)));
    }

    #[test]
    fn test_line_col_without_span() {
        let diagnostic = Diagnostic::warning("x", None, DiagnosticCode::TemplateTip);
        assert_eq!(diagnostic.line_col("abc"), None);
        assert_eq!(diagnostic.code.as_str(), "template-tip");
    }
}
