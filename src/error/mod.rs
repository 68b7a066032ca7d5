//! Centralized error handling for quill
//!
//! Two top-level categories: infrastructure errors (I/O failure,
//! sizing-arithmetic overflow) which abandon the current operation, and
//! user errors with distinguished kinds which propagate to the nearest
//! handler. End-of-input is never an error.

use thiserror::Error;

/// Errors raised by the quill core.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure while reading or writing a collaborator resource.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Arithmetic overflow while sizing a buffer, or allocation failure.
    #[error("infrastructure error: {0}")]
    Infra(&'static str),

    /// A search or match operation found nothing.
    #[error("no match")]
    NoMatch,

    /// Malformed pattern, expression, or macro input.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Division or modulo by zero in the expression evaluator.
    #[error("divide by zero")]
    DivideByZero,

    /// Signed overflow in user-level arithmetic.
    #[error("user overflow")]
    UserOverflow,

    /// An operation was invoked with unusable arguments.
    #[error("usage error: {0}")]
    Usage(String),
}

impl Error {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Error::Syntax(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Error::Usage(msg.into())
    }

    /// True for user-level errors that a driver may survive.
    pub fn is_user(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::Infra(_))
    }

    /// Process exit code carried by the collaborator CLIs.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io(_) | Error::Infra(_) => 1,
            Error::NoMatch => 2,
            Error::Syntax(_) => 3,
            Error::DivideByZero => 4,
            Error::UserOverflow => 5,
            Error::Usage(_) => 6,
        }
    }
}

/// Result alias for quill operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
