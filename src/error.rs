//! # Error taxonomy
//!
//! One flat enum covering both load-time (tokenizer, program store) and
//! run-time (VM) failures, in the style of this codebase's `CommandError`
//! and `LanguageError`: named variants, each carrying its own `#[error(...)]`
//! message via `thiserror`.

use thiserror::Error;

/// Numeric error code, preserved from the reference implementation so
/// `--dump`/test fixtures can assert on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u8);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BasicError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Math domain error")]
    MathDomain,
    #[error("Math overflow")]
    MathOverflow,
    #[error("Index out of range")]
    IndexOutOfRange,
    #[error("Type mismatch")]
    TypeMismatch,
    #[error("FOR step cannot be zero")]
    ForStepZero,
    #[error("RETURN without GOSUB")]
    ReturnWithoutGosub,
    #[error("NEXT without FOR")]
    NextWithoutFor,
    #[error("Bad line number")]
    BadLineNumber,
    #[error("Syntax error")]
    SyntaxError,
    #[error("Line too long")]
    LineTooLong,
    #[error("Program too large")]
    ProgramTooLarge,
    #[error("Stack overflow")]
    StackOverflow,
}

impl BasicError {
    /// The numeric code from spec §7, kept stable for tooling/tests.
    pub fn code(&self) -> ErrorCode {
        use BasicError::*;
        ErrorCode(match self {
            DivisionByZero => 1,
            MathDomain => 2,
            MathOverflow => 3,
            IndexOutOfRange => 4,
            TypeMismatch => 5,
            ForStepZero => 6,
            ReturnWithoutGosub => 7,
            NextWithoutFor => 8,
            BadLineNumber => 10,
            SyntaxError => 11,
            LineTooLong => 12,
            ProgramTooLarge => 13,
            StackOverflow => 14,
        })
    }
}

/// A `BasicError` paired with the line it was raised on, per spec §7
/// "Propagation": "a single-record error state (code + line number)".
#[derive(Clone, PartialEq)]
pub struct LineError {
    pub error: BasicError,
    pub line: u16,
}

impl std::fmt::Display for LineError {
    /// `Error <code> at line <N>: <message>`, per spec §7 "User-visible behavior".
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Error {} at line {}: {}",
            self.error.code().0,
            self.line,
            self.error
        )
    }
}

/// Forwards to `Display` so `main`'s `Result<(), Box<dyn Error>>` exit
/// path — which prints the error via `{:?}` — still shows the single-line
/// `Error <code> at line <N>: <message>` report spec §7 requires.
impl std::fmt::Debug for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for LineError {}
