//! Error types for template compilation.

use source_map::Span;
use std::fmt;

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// An error that occurred during template compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CompileError {
    /// The error message.
    pub message: String,
    /// The span where the error occurred, relative to the template.
    pub span: Span,
    /// The error code.
    pub code: CompileErrorCode,
}

impl CompileError {
    /// Create a new compile error.
    pub fn new(message: impl Into<String>, span: Span, code: CompileErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
        }
    }

    /// Create an invalid expression error.
    pub fn invalid_expression(reason: &str, raw: &str, span: Span) -> Self {
        Self::new(
            format!(
                "invalid expression: {} in\n\n    {}\n\n  Raw expression: {}\n",
                reason, raw, raw
            ),
            span,
            CompileErrorCode::InvalidExpression,
        )
    }

    pub fn invalid_v_for(raw: &str, span: Span) -> Self {
        Self::new(
            format!("Invalid v-for expression: {}", raw),
            span,
            CompileErrorCode::InvalidVFor,
        )
    }

    pub fn unclosed_element(tag: &str, span: Span) -> Self {
        Self::new(
            format!("tag <{}> has no matching end tag.", tag),
            span,
            CompileErrorCode::UnclosedElement,
        )
    }
}

/// A note about template content that compiles but is ignored or
/// discouraged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub message: String,
    pub span: Span,
}

impl Tip {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Error codes for template compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorCode {
    /// Invalid expression syntax.
    InvalidExpression,
    /// Element without a matching end tag, or a stray end tag.
    UnclosedElement,
    /// Invalid v-for syntax.
    InvalidVFor,
    /// v-else / v-else-if without a preceding v-if.
    OrphanElse,
    /// Template root is missing, duplicated or not a single element.
    InvalidRoot,
    /// Text outside the root element.
    TextOutsideRoot,
}

impl CompileErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidExpression => "invalid-expression",
            Self::UnclosedElement => "unclosed-element",
            Self::InvalidVFor => "invalid-v-for",
            Self::OrphanElse => "orphan-else",
            Self::InvalidRoot => "invalid-root",
            Self::TextOutsideRoot => "text-outside-root",
        }
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
