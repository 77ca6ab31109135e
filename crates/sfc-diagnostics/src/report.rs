//! `miette` reports with code frames into the document.

use crate::template::document_span;
use miette::{LabeledSpan, NamedSource, SourceCode, SourceSpan};
use sfc_compiler::{CompileError, CompileOutput};
use source_map::Span;
use std::fmt;

fn source_span(span: Span) -> SourceSpan {
    SourceSpan::new((span.start as usize).into(), span.len() as usize)
}

/// Every template error of one document, one related frame per error.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{count} template error(s) in {path}")]
#[diagnostic(code(sfc::template))]
pub struct TemplateErrorReport {
    pub path: String,
    pub count: usize,
    #[source_code]
    pub src: NamedSource<String>,
    #[related]
    pub frames: Vec<TemplateErrorFrame>,
}

/// One template error.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
#[error("{message}")]
pub struct TemplateErrorFrame {
    pub message: String,
    #[label]
    pub span: Option<SourceSpan>,
}

impl TemplateErrorReport {
    /// `None` when the template compiled cleanly.
    pub fn new(path: &str, source: &str, output: &CompileOutput) -> Option<Self> {
        if output.errors.is_empty() {
            return None;
        }
        let content_start = output
            .template
            .as_ref()
            .map(|template| template.content_start())
            .unwrap_or_default();

        let frames: Vec<_> = output
            .errors
            .iter()
            .map(|error| TemplateErrorFrame {
                message: error.msg.clone(),
                span: document_span(error, content_start).map(source_span),
            })
            .collect();

        Some(Self {
            path: path.to_string(),
            count: frames.len(),
            src: NamedSource::new(path, source.to_string()),
            frames,
        })
    }
}

/// A fatal compile error with a frame at its span.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CompileErrorReport {
    pub message: String,
    pub code: &'static str,
    pub span: Option<SourceSpan>,
    pub src: NamedSource<String>,
}

impl CompileErrorReport {
    pub fn new(path: &str, source: &str, error: &CompileError) -> Self {
        Self {
            message: error.to_string(),
            code: error.code(),
            span: error.span().map(source_span),
            src: NamedSource::new(path, source.to_string()),
        }
    }
}

impl miette::Diagnostic for CompileErrorReport {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("sfc::{}", self.code)))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.span?;
        Some(Box::new(std::iter::once(LabeledSpan::underline(span))))
    }
}
