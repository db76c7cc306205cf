use crate::ast::Span;
use crate::tokenizer::LexError;
use thiserror::Error;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token at {}: expected {expected}, found {found}", span.start)]
    UnexpectedToken {
        span: Span,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of input at {}: expected {expected}", span.start)]
    UnexpectedEof { span: Span, expected: String },

    #[error("Invalid syntax at {}: {message}", span.start)]
    InvalidSyntax { span: Span, message: String },

    #[error("Lexer error at {}: {message}", span.start)]
    Lex { span: Span, message: String },
}

impl ParseError {
    pub fn unexpected_token(
        span: Span,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::UnexpectedToken {
            span,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(span: Span, expected: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            span,
            expected: expected.into(),
        }
    }

    pub fn invalid_syntax(span: Span, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            span,
            message: message.into(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidSyntax { span, .. }
            | ParseError::Lex { span, .. } => *span,
        }
    }

    /// Message without the position prefix
    pub fn description(&self) -> String {
        match self {
            ParseError::UnexpectedToken {
                expected, found, ..
            } => format!("expected {}, found {}", expected, found),
            ParseError::UnexpectedEof { expected, .. } => {
                format!("unexpected end of input, expected {}", expected)
            }
            ParseError::InvalidSyntax { message, .. } | ParseError::Lex { message, .. } => {
                message.clone()
            }
        }
    }

    pub fn is_lex_error(&self) -> bool {
        matches!(self, ParseError::Lex { .. })
    }
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        Self::Lex {
            span: err.span,
            message: err.message,
        }
    }
}
