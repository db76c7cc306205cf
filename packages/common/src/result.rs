use crate::error::CompileError;

/// Result of a whole compilation
pub type CompileResult<T> = Result<T, CompileError>;
