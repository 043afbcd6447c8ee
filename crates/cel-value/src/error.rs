//! Evaluation error types.

use std::fmt;

/// An error that occurred during CEL evaluation.
///
/// Evaluation errors are values: they propagate through operators as
/// `Value::Error` rather than unwinding the evaluator.
#[derive(Debug, Clone)]
pub struct EvalError {
    /// The error message.
    pub message: String,
    /// The kind of error.
    pub kind: EvalErrorKind,
}

/// The kind of evaluation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Attribute (variable plus qualifier path) could not be resolved.
    NoSuchAttribute,
    /// Key not found in map.
    NoSuchKey,
    /// Index out of bounds.
    IndexOutOfBounds,
    /// No matching overload found for a function or operator.
    NoMatchingOverload,
    /// Type mismatch at runtime.
    TypeMismatch,
    /// Division by zero.
    DivisionByZero,
    /// Integer overflow.
    Overflow,
    /// Invalid argument.
    InvalidArgument,
    /// Internal error (unexpected state).
    Internal,
}

impl EvalError {
    /// Create a new error with the given kind and message.
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Create a no such attribute error.
    pub fn no_such_attribute(name: &str) -> Self {
        Self::new(
            EvalErrorKind::NoSuchAttribute,
            format!("no such attribute: {}", name),
        )
    }

    /// Create a key not found error.
    pub fn no_such_key(key: &str) -> Self {
        Self::new(EvalErrorKind::NoSuchKey, format!("no such key: {}", key))
    }

    /// Create an index out of bounds error.
    pub fn index_out_of_bounds(index: i64, len: usize) -> Self {
        Self::new(
            EvalErrorKind::IndexOutOfBounds,
            format!("index {} out of bounds for length {}", index, len),
        )
    }

    /// Create a no matching overload error.
    pub fn no_matching_overload(func: &str) -> Self {
        Self::new(
            EvalErrorKind::NoMatchingOverload,
            format!("no matching overload for function: {}", func),
        )
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            EvalErrorKind::TypeMismatch,
            format!("expected {}, got {}", expected, actual),
        )
    }

    /// Create a division by zero error.
    pub fn division_by_zero() -> Self {
        Self::new(EvalErrorKind::DivisionByZero, "division by zero")
    }

    /// Create an overflow error.
    pub fn overflow(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Overflow, message)
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidArgument, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Internal, message)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        Self::new(EvalErrorKind::Internal, s)
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        Self::new(EvalErrorKind::Internal, s)
    }
}
