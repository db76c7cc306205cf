use lessrs_parser::ast::Span;
use thiserror::Error;

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("variable @{name} is undefined")]
    UnresolvedVariable { name: String, span: Span },

    #[error("variable @{name} is used before its definition")]
    UseBeforeDefinition { name: String, span: Span },

    #[error("{name} is undefined")]
    UndefinedMixin { name: String, span: Span },

    #[error("no matching definition was found for {name} with {args} argument(s)")]
    NoMatchingMixin {
        name: String,
        args: usize,
        span: Span,
    },

    #[error("{message}")]
    TypeMismatch { message: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("mixin {name} exceeded the recursion limit of {limit}")]
    RecursionLimitExceeded {
        name: String,
        limit: usize,
        span: Span,
    },

    #[error("{name}(): {message}")]
    InvalidFunctionArgs {
        name: String,
        message: String,
        span: Span,
    },

    #[error("declarations must be inside a ruleset")]
    DeclarationOutsideRuleset { span: Span },
}

impl EvalError {
    pub fn type_mismatch(span: Span, message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn invalid_args(span: Span, name: &str, message: impl Into<String>) -> Self {
        Self::InvalidFunctionArgs {
            name: name.to_string(),
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            EvalError::UnresolvedVariable { span, .. }
            | EvalError::UseBeforeDefinition { span, .. }
            | EvalError::UndefinedMixin { span, .. }
            | EvalError::NoMatchingMixin { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::RecursionLimitExceeded { span, .. }
            | EvalError::InvalidFunctionArgs { span, .. }
            | EvalError::DeclarationOutsideRuleset { span } => *span,
        }
    }

    /// Unknown names: variables, mixins, forward references
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            EvalError::UnresolvedVariable { .. }
                | EvalError::UseBeforeDefinition { .. }
                | EvalError::UndefinedMixin { .. }
                | EvalError::NoMatchingMixin { .. }
                | EvalError::DeclarationOutsideRuleset { .. }
        )
    }
}
