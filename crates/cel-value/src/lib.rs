//! Runtime values for CEL evaluation.
//!
//! This crate provides the value layer consumed by the planning and
//! evaluation engine:
//!
//! - `Value` represents all runtime values, including the `Error` and
//!   `Unknown` sentinel kinds that propagate through every operator
//! - `MapKey` and `ValueMap` back CEL maps with deterministic iteration
//! - `EvalError` describes language-level evaluation failures
//! - `ValueTrait` advertises per-value capabilities (iterable, sizer, ...)
//!   used for overload eligibility checks
//!
//! Evaluation never throws for language-level failures: an operation that
//! fails produces a `Value::Error`, and partially-defined input produces a
//! `Value::Unknown` carrying the originating expression ids.

mod error;
mod value;

pub use error::{EvalError, EvalErrorKind};
pub use value::{MapKey, TypeValue, Unknown, Value, ValueMap, ValueTrait};
