//! Error types for document segmentation and script parsing.

use source_map::Span;
use std::fmt;

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A structural document error. Always fatal for the compile call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Document-relative byte span where the error occurred.
    pub span: Span,
    /// The error code.
    pub code: ErrorCode,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(message: impl Into<String>, span: Span, code: ErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
        }
    }

    /// Create an unclosed tag error.
    pub fn unclosed_tag(tag: &str, span: Span) -> Self {
        Self::new(
            format!("Unclosed tag: <{}>", tag),
            span,
            ErrorCode::UnclosedTag,
        )
    }

    /// Create a duplicate block error.
    pub fn duplicate_block(block: &str, span: Span) -> Self {
        Self::new(
            format!("Duplicate {} block", block),
            span,
            ErrorCode::DuplicateBlock,
        )
    }

    pub fn language_mismatch(span: Span) -> Self {
        Self::new(
            "<script setup> language must be the same as <script>",
            span,
            ErrorCode::LanguageMismatch,
        )
    }

    pub fn unsupported_language(lang: &str, span: Span) -> Self {
        Self::new(
            format!("Unsupported script language: {}", lang),
            span,
            ErrorCode::UnsupportedLanguage,
        )
    }

    /// Create a syntax error raised by the script parser.
    pub fn script_syntax(message: impl fmt::Display, span: Span) -> Self {
        Self::new(
            format!("Syntax error in script: {}", message),
            span,
            ErrorCode::ScriptSyntax,
        )
    }
}

/// Error codes for categorizing parse errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Two blocks of a kind that may appear only once.
    DuplicateBlock,
    /// `<script setup>` and `<script>` declare different languages.
    LanguageMismatch,
    /// A `lang` attribute outside js/ts/jsx/tsx.
    UnsupportedLanguage,
    /// Unclosed tag.
    UnclosedTag,
    /// Script segment failed to parse.
    ScriptSyntax,
}

impl ErrorCode {
    /// Get the error code as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateBlock => "duplicate-block",
            ErrorCode::LanguageMismatch => "language-mismatch",
            ErrorCode::UnsupportedLanguage => "unsupported-language",
            ErrorCode::UnclosedTag => "unclosed-tag",
            ErrorCode::ScriptSyntax => "script-syntax",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_uses_message() {
        let err = ParseError::duplicate_block("script setup", Span::new(3, 9));
        assert_eq!(err.to_string(), "Duplicate script setup block");
        assert_eq!(err.code.as_str(), "duplicate-block");
    }
}
