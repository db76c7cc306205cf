pub mod ast;
pub mod error;
pub mod parser;
pub mod position;
pub mod tokenizer;

pub use error::{ParseError, ParseResult};
pub use parser::{parse, Parser, MAX_NESTING_DEPTH};
pub use position::{LineIndex, SourcePosition};
pub use tokenizer::{tokenize, LexError, SpannedToken, Token, TokenKind};
