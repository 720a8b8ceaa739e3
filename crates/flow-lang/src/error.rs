//! Compile errors, each anchored to a source line.

use thiserror::Error;

/// Compilation failures; none of these ever reach runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Lexical or syntactic failure.
    #[error("parse error at line {line}: {message}")]
    Parse { message: String, line: usize },

    /// Type mismatch or unknown name.
    #[error("type error at line {line}: {message}")]
    Type { message: String, line: usize },

    /// Duplicate function, event, field or variable.
    #[error("duplicate {what} `{name}` at line {line}")]
    Duplicate {
        what: &'static str,
        name: String,
        line: usize,
    },

    /// A generated value exceeds its encoding, e.g. a branch offset.
    #[error("out of range at line {line}: {message}")]
    OutOfRange { message: String, line: usize },

    /// An array operation the language does not define.
    #[error("unsupported array operation at line {line}: {message}")]
    UnsupportedArrayOp { message: String, line: usize },
}

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;
