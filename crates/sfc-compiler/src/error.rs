//! Error types for the compile pipeline.

use sfc_parser::ParseError;
use source_map::Span;
use std::fmt;

/// Result type for compile operations.
pub type CompileResult<T> = Result<T, CompileError>;

/// A misuse of a compiler macro in `<script setup>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MacroError {
    pub message: String,
    /// Document-relative span of the offending node.
    pub span: Span,
    pub code: MacroErrorCode,
}

impl MacroError {
    pub fn new(message: impl Into<String>, span: Span, code: MacroErrorCode) -> Self {
        Self {
            message: message.into(),
            span,
            code,
        }
    }

    pub fn duplicate(name: &str, span: Span) -> Self {
        Self::new(
            format!("duplicate {}() call", name),
            span,
            MacroErrorCode::DuplicateMacro,
        )
    }

    pub fn mixed_arguments(name: &str, span: Span) -> Self {
        Self::new(
            format!(
                "{}() cannot accept both type and non-type arguments at the same time. Use one or the other.",
                name
            ),
            span,
            MacroErrorCode::MixedArguments,
        )
    }
}

/// Macro error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroErrorCode {
    /// A macro called more than once.
    DuplicateMacro,
    /// Both a type argument and a value argument.
    MixedArguments,
    /// `withDefaults` without a type-based `defineProps`.
    InvalidWithDefaults,
    /// A type argument that is not a literal type or a local reference to one.
    UnresolvableType,
    /// `await` at the top level of the setup scope.
    TopLevelAwait,
}

impl MacroErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateMacro => "duplicate-macro",
            Self::MixedArguments => "mixed-arguments",
            Self::InvalidWithDefaults => "invalid-with-defaults",
            Self::UnresolvableType => "unresolvable-type",
            Self::TopLevelAwait => "top-level-await",
        }
    }
}

impl fmt::Display for MacroErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A fatal compile error. No module is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Structural document or script syntax error.
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Macro(#[from] MacroError),

    /// The template compiler output does not start with the
    /// `render` / `staticRenderFns` declarations.
    #[error("invalid render function module: {message}")]
    RenderContract { message: String },

    /// The scripts cannot be merged into one module.
    #[error("{message}")]
    Assembly { message: String, span: Span },
}

impl CompileError {
    pub fn render_contract(message: impl Into<String>) -> Self {
        Self::RenderContract {
            message: message.into(),
        }
    }

    /// Document-relative span, when the error points at source text.
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Parse(err) => Some(err.span),
            Self::Macro(err) => Some(err.span),
            Self::RenderContract { .. } => None,
            Self::Assembly { span, .. } => Some(*span),
        }
    }

    /// A stable kebab-case code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(err) => err.code.as_str(),
            Self::Macro(err) => err.code.as_str(),
            Self::RenderContract { .. } => "render-contract",
            Self::Assembly { .. } => "assembly",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_macro_error_messages() {
        let err = MacroError::duplicate("defineProps", Span::new(0, 4));
        assert_eq!(err.to_string(), "duplicate defineProps() call");
        assert_eq!(err.code.as_str(), "duplicate-macro");

        let err = CompileError::from(MacroError::mixed_arguments("defineEmits", Span::new(2, 9)));
        assert!(err.to_string().starts_with("defineEmits() cannot accept both"));
        assert_eq!(err.code(), "mixed-arguments");
        assert_eq!(err.span(), Some(Span::new(2, 9)));
    }

    #[test]
    fn test_render_contract_has_no_span() {
        let err = CompileError::render_contract("expected `render` declaration");
        assert_eq!(err.span(), None);
        assert_eq!(
            err.to_string(),
            "invalid render function module: expected `render` declaration"
        );
    }
}
