use lessrs_evaluator::EvalError;
use lessrs_parser::ast::Span;
use lessrs_parser::{LineIndex, ParseError, SourcePosition};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Category of a failed compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed token
    Lex,
    /// Grammar violation
    Parse,
    /// Unknown variable or mixin, use before definition
    Resolution,
    /// Incompatible units or types in an expression
    TypeMismatch,
    RecursionLimitExceeded,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Lex => "LexError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Resolution => "ResolutionError",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::RecursionLimitExceeded => "RecursionLimitExceeded",
        };
        f.write_str(name)
    }
}

/// The one error `compile` returns, whatever stage failed
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind} at line {}, column {}: {message}", .position.line, .position.column)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: SourcePosition,
    /// Trimmed source line the error points into
    pub excerpt: String,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, source: &str, span: Span) -> Self {
        let index = LineIndex::new(source);
        Self {
            kind,
            message: message.into(),
            position: index.position(span.start),
            excerpt: index.line_text(span.start).trim().to_string(),
            span,
        }
    }

    pub fn from_parse(err: &ParseError, source: &str) -> Self {
        let kind = if err.is_lex_error() {
            ErrorKind::Lex
        } else {
            ErrorKind::Parse
        };
        Self::new(kind, err.description(), source, err.span())
    }

    pub fn from_eval(err: &EvalError, source: &str) -> Self {
        let kind = match err {
            err if err.is_resolution_error() => ErrorKind::Resolution,
            EvalError::RecursionLimitExceeded { .. } => ErrorKind::RecursionLimitExceeded,
            _ => ErrorKind::TypeMismatch,
        };
        Self::new(kind, err.to_string(), source, err.span())
    }
}

/// Render an error against its source for terminal output
#[cfg(feature = "pretty-errors")]
pub fn format_error(err: &CompileError, source: &str, filename: &str) -> String {
    use ariadne::{Config, Label, Report, ReportKind, Source};

    let start = err.span.start.min(source.len());
    let end = err.span.end.clamp(start, source.len());

    let mut output = Vec::new();
    let report = Report::build(ReportKind::Error, filename, start)
        .with_config(Config::default().with_color(false))
        .with_message(format!("{}: {}", err.kind, err.message))
        .with_label(Label::new((filename, start..end)).with_message(&err.message))
        .finish();

    if report
        .write((filename, Source::from(source)), &mut output)
        .is_err()
    {
        return plain_report(err, filename);
    }
    String::from_utf8_lossy(&output).into_owned()
}

/// Render an error against its source for terminal output
#[cfg(not(feature = "pretty-errors"))]
pub fn format_error(err: &CompileError, _source: &str, filename: &str) -> String {
    plain_report(err, filename)
}

fn plain_report(err: &CompileError, filename: &str) -> String {
    format!(
        "{}:{}:{}: {}\n    {}\n",
        filename, err.position.line, err.position.column, err, err.excerpt
    )
}
