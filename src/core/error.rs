//! Core error types for parsing and evaluation

use std::fmt;
use thiserror::Error;

/// Source position for parse error reporting (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
}

impl SourcePosition {
    /// Create a new source position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Compute the position of a byte offset within the input text.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let mut line = 1;
        let mut column = 1;
        for (i, ch) in input.char_indices() {
            if i >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { line, column }
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Error type covering every failure mode of the engine.
///
/// Parse errors are terminal; evaluation errors abort the evaluation that
/// raised them. Three-valued "unknown" results are *not* errors — operations
/// that the FHIRPath specification defines as yielding empty return an empty
/// collection instead.
#[derive(Debug, Clone, Error)]
pub enum FhirPathError {
    /// Syntax or grammar violation discovered while parsing
    #[error("parse error at {position}: {message}")]
    ParseError {
        /// Position of the offending token
        position: SourcePosition,
        /// What went wrong
        message: String,
        /// The expression being parsed
        expression: String,
    },

    /// An operator or function received an operand of the wrong kind
    #[error("type error: {0}")]
    TypeError(String),

    /// A function was called with the wrong number of arguments
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    ArityError {
        /// Function name
        function: String,
        /// Human-readable arity description (e.g. "1", "1 or 2")
        expected: String,
        /// Number of arguments supplied
        actual: usize,
    },

    /// An operation required a single element but the collection had many
    #[error("singleton required: {0}")]
    SingletonError(String),

    /// A value was out of the domain an operation accepts
    #[error("domain error: {0}")]
    DomainError(String),

    /// A quantity operation was attempted across non-comparable UCUM units
    #[error("unit error: cannot combine '{left}' with '{right}'")]
    UnitError {
        /// Left operand unit
        left: String,
        /// Right operand unit
        right: String,
    },

    /// An external constant `%name` was not bound in the context
    #[error("undefined variable '%{0}'")]
    UndefinedVariable(String),

    /// Cancellation was signaled through the evaluation's token
    #[error("evaluation cancelled")]
    Cancelled,
}

impl FhirPathError {
    /// Create a parse error at a byte offset within `expression`.
    pub fn parse_error(expression: &str, offset: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            position: SourcePosition::from_offset(expression, offset),
            message: message.into(),
            expression: expression.to_string(),
        }
    }

    /// Create a type error
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    /// Create an arity error
    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        Self::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
        }
    }

    /// Create a singleton-required error
    pub fn singleton_error(message: impl Into<String>) -> Self {
        Self::SingletonError(message.into())
    }

    /// Create a domain error
    pub fn domain_error(message: impl Into<String>) -> Self {
        Self::DomainError(message.into())
    }

    /// Create a unit incompatibility error
    pub fn unit_error(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self::UnitError {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, FhirPathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_from_offset() {
        let input = "Patient.name\n  .given";
        assert_eq!(SourcePosition::from_offset(input, 0), SourcePosition::new(1, 1));
        assert_eq!(SourcePosition::from_offset(input, 8), SourcePosition::new(1, 9));
        assert_eq!(SourcePosition::from_offset(input, 15), SourcePosition::new(2, 3));
    }

    #[test]
    fn parse_error_display() {
        let err = FhirPathError::parse_error("1 +", 3, "unexpected end of expression");
        assert_eq!(
            err.to_string(),
            "parse error at 1:4: unexpected end of expression"
        );
    }
}
