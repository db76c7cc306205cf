//! Tokenizer for LESS stylesheets using logos
//!
//! Whitespace is kept as a token: the parser needs it to tell a descendant
//! combinator (`.a .b`) from a compound selector (`.a.b`), and a binary minus
//! (`1 - 2`) from a negative list item (`0 -5px`).

use crate::ast::Span;
use logos::Logos;
use std::fmt;
use thiserror::Error;

/// Token types for LESS syntax
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'src> {
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    // Comments
    #[token("/*", block_comment)]
    Comment(&'src str),

    /// `//` comments never reach the output
    #[regex(r"//[^\n]*", |lex| lex.slice())]
    LineComment(&'src str),

    // Names
    #[regex(r"-{0,2}[a-zA-Z_][a-zA-Z0-9_-]*", |lex| lex.slice())]
    Ident(&'src str),

    #[regex(r"@[a-zA-Z_-][a-zA-Z0-9_-]*", |lex| lex.slice())]
    AtKeyword(&'src str),

    #[regex(r"@@[a-zA-Z_-][a-zA-Z0-9_-]*", |lex| lex.slice())]
    VariableVariable(&'src str),

    #[regex(r"@\{[a-zA-Z0-9_-]+\}", |lex| lex.slice())]
    Interpolation(&'src str),

    #[regex(r"#[a-zA-Z0-9_-]+", |lex| lex.slice())]
    Hash(&'src str),

    // Literals
    #[regex(r"([0-9]+(\.[0-9]+)?|\.[0-9]+)([a-zA-Z]+|%)?", |lex| lex.slice())]
    Number(&'src str),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| lex.slice())]
    String(&'src str),

    #[regex(r#""([^"\\\n]|\\.)*"#, |lex| lex.slice())]
    #[regex(r#"'([^'\\\n]|\\.)*"#, |lex| lex.slice())]
    UnterminatedString(&'src str),

    /// The whole `url(...)`, quoted or not
    #[token("url(", url_body)]
    Url(&'src str),

    #[regex(r"![ \t]*important")]
    Important,

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("~")]
    Tilde,
    #[token("=")]
    Eq,
    #[token("!")]
    Bang,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("$")]
    Dollar,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    #[token("?")]
    Question,

    // Punctuation
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,

    /// Emitted once by [`tokenize`] after the last real token
    Eof,
}

/// Coarse classification of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    AtKeyword,
    Number,
    String,
    Color,
    Operator,
    Punctuation,
    Comment,
    Whitespace,
    Eof,
}

impl<'src> Token<'src> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Whitespace => TokenKind::Whitespace,
            Token::Comment(_) | Token::LineComment(_) => TokenKind::Comment,
            Token::Ident(_) | Token::Url(_) | Token::Important => TokenKind::Ident,
            Token::AtKeyword(_) | Token::VariableVariable(_) | Token::Interpolation(_) => {
                TokenKind::AtKeyword
            }
            Token::Hash(_) => TokenKind::Color,
            Token::Number(_) => TokenKind::Number,
            Token::String(_) | Token::UnterminatedString(_) => TokenKind::String,
            Token::Plus
            | Token::Minus
            | Token::Star
            | Token::Slash
            | Token::Gt
            | Token::Lt
            | Token::Tilde
            | Token::Eq
            | Token::Bang
            | Token::Percent
            | Token::Caret
            | Token::Dollar
            | Token::Pipe
            | Token::Amp
            | Token::Question => TokenKind::Operator,
            Token::LBrace
            | Token::RBrace
            | Token::LParen
            | Token::RParen
            | Token::LBracket
            | Token::RBracket
            | Token::Colon
            | Token::Semi
            | Token::Comma
            | Token::Dot
            | Token::Ellipsis => TokenKind::Punctuation,
            Token::Eof => TokenKind::Eof,
        }
    }

    /// Whitespace and comments
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Token::Whitespace | Token::Comment(_) | Token::LineComment(_)
        )
    }
}

impl<'src> fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Whitespace => write!(f, "whitespace"),
            Token::Comment(_) | Token::LineComment(_) => write!(f, "comment"),
            Token::Ident(s) => write!(f, "identifier '{}'", s),
            Token::AtKeyword(s) => write!(f, "'{}'", s),
            Token::VariableVariable(s) => write!(f, "'{}'", s),
            Token::Interpolation(s) => write!(f, "interpolation '{}'", s),
            Token::Hash(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::String(s) | Token::UnterminatedString(s) => write!(f, "string {}", s),
            Token::Url(u) => write!(f, "{}", u),
            Token::Important => write!(f, "!important"),
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::Gt => write!(f, "'>'"),
            Token::Lt => write!(f, "'<'"),
            Token::Tilde => write!(f, "'~'"),
            Token::Eq => write!(f, "'='"),
            Token::Bang => write!(f, "'!'"),
            Token::Percent => write!(f, "'%'"),
            Token::Caret => write!(f, "'^'"),
            Token::Dollar => write!(f, "'$'"),
            Token::Pipe => write!(f, "'|'"),
            Token::Amp => write!(f, "'&'"),
            Token::Question => write!(f, "'?'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Colon => write!(f, "':'"),
            Token::Semi => write!(f, "';'"),
            Token::Comma => write!(f, "','"),
            Token::Dot => write!(f, "'.'"),
            Token::Ellipsis => write!(f, "'...'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Consume a block comment up to its `*/`
fn block_comment<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> Option<&'src str> {
    match lex.remainder().find("*/") {
        Some(idx) => {
            lex.bump(idx + 2);
            Some(lex.slice())
        }
        None => {
            lex.bump(lex.remainder().len());
            None
        }
    }
}

/// Consume a `url(` body up to the closing `)`, skipping over quoted text
fn url_body<'src>(lex: &mut logos::Lexer<'src, Token<'src>>) -> Option<&'src str> {
    let rest = lex.remainder();
    let mut quote = None;
    let mut escaped = false;

    for (idx, c) in rest.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (c, quote) {
            ('\\', _) => escaped = true,
            ('\n', Some(_)) => break,
            (c, Some(q)) if c == q => quote = None,
            (_, Some(_)) => {}
            ('"' | '\'', None) => quote = Some(c),
            (')', None) => {
                lex.bump(idx + 1);
                return Some(lex.slice());
            }
            _ => {}
        }
    }

    lex.bump(rest.len());
    None
}

/// A token with its span
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpannedToken<'src> {
    pub token: Token<'src>,
    pub span: Span,
}

/// Malformed input found while tokenizing
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Lazy token stream over a source string.
///
/// Yields every token in order, then a single [`Token::Eof`], then `None`.
/// The first lex error ends the stream.
pub struct Tokens<'src> {
    lexer: logos::SpannedIter<'src, Token<'src>>,
    source: &'src str,
    done: bool,
}

impl<'src> Iterator for Tokens<'src> {
    type Item = Result<SpannedToken<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.lexer.next() {
            Some((Ok(Token::UnterminatedString(text)), span)) => {
                self.done = true;
                Some(Err(LexError {
                    span: span.into(),
                    message: format!("unterminated string {}", text.trim_end()),
                }))
            }
            Some((Ok(token), span)) => Some(Ok(SpannedToken {
                token,
                span: span.into(),
            })),
            Some((Err(()), span)) => {
                self.done = true;
                let text = &self.source[span.clone()];
                let message = if text.starts_with("/*") {
                    "unterminated comment".to_string()
                } else if text.starts_with("url(") {
                    "unterminated url(".to_string()
                } else {
                    let found = text.chars().next().unwrap_or(' ');
                    format!("unexpected character '{}'", found.escape_debug())
                };
                Some(Err(LexError {
                    span: span.into(),
                    message,
                }))
            }
            None => {
                self.done = true;
                Some(Ok(SpannedToken {
                    token: Token::Eof,
                    span: Span::new(self.source.len(), self.source.len()),
                }))
            }
        }
    }
}

/// Tokenize a source string
pub fn tokenize(source: &str) -> Tokens<'_> {
    Tokens {
        lexer: Token::lexer(source).spanned(),
        source,
        done: false,
    }
}
