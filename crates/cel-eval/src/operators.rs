//! Internal operator function names.
//!
//! Operators are planned as calls to functions with mangled names that
//! cannot collide with user-declared identifiers.

/// Logical and operator.
pub const LOGICAL_AND: &str = "_&&_";
/// Logical or operator.
pub const LOGICAL_OR: &str = "_||_";
/// Logical not operator.
pub const LOGICAL_NOT: &str = "!_";
/// Ternary conditional operator.
pub const CONDITIONAL: &str = "_?_:_";
/// Equality operator.
pub const EQUALS: &str = "_==_";
/// Inequality operator.
pub const NOT_EQUALS: &str = "_!=_";
/// Index operator.
pub const INDEX: &str = "_[_]";
/// Membership operator.
pub const IN: &str = "@in";

/// Addition operator.
pub const ADD: &str = "_+_";
/// Subtraction operator.
pub const SUBTRACT: &str = "_-_";
/// Multiplication operator.
pub const MULTIPLY: &str = "_*_";
/// Division operator.
pub const DIVIDE: &str = "_/_";
/// Modulo operator.
pub const MODULO: &str = "_%_";
/// Arithmetic negation operator.
pub const NEGATE: &str = "-_";
/// Less than operator.
pub const LESS: &str = "_<_";
/// Less than or equal operator.
pub const LESS_EQUALS: &str = "_<=_";
/// Greater than operator.
pub const GREATER: &str = "_>_";
/// Greater than or equal operator.
pub const GREATER_EQUALS: &str = "_>=_";

/// Whether the function name is one of the standard type conversion
/// functions. Conversions of constant arguments are eligible for folding
/// at plan time.
pub fn is_type_conversion(function: &str) -> bool {
    matches!(
        function,
        "int" | "uint" | "double" | "string" | "bytes" | "bool" | "type" | "dyn"
    )
}
