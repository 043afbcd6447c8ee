//! Plan-time errors.
//!
//! Unlike runtime failures, which travel as `Value::Error`, planning
//! failures abort compilation with a `PlanError`.

use cel_value::EvalError;
use thiserror::Error;

use crate::ast::ExprId;

/// An error raised while planning an expression.
#[derive(Debug, Clone, Error)]
pub enum PlanError {
    /// The expression node cannot be planned.
    #[error("unsupported expression at id {0}")]
    UnsupportedExpr(ExprId),

    /// A global call names a function no dispatcher knows.
    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Two overloads with the same name were added to one dispatcher.
    #[error("overload already exists: {0}")]
    OverloadRedefinition(String),

    /// A struct construction names a type the provider cannot find.
    #[error("unknown type: {0}")]
    UnknownType(String),

    /// Constant folding produced an evaluation error.
    #[error("constant folding failed: {0}")]
    ConstantFolding(EvalError),

    /// An index expression produced a constant that cannot qualify.
    #[error("invalid qualifier: {0}")]
    InvalidQualifier(String),
}
