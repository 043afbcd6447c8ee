//! Expression tree consumed by the planner.
//!
//! Every expression node carries a stable id. Ids key the reference and
//! type maps produced by a type checker, the per-node results recorded in
//! [`crate::EvalState`], and the unknown ids carried by partial
//! evaluation results.

use std::collections::HashMap;

use cel_value::{TypeValue, Value};

/// Identifier of an expression node. Ids are positive and unique within
/// a single AST.
pub type ExprId = i64;

/// A literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Null literal.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Signed integer literal.
    Int(i64),
    /// Unsigned integer literal.
    UInt(u64),
    /// Float literal.
    Double(f64),
    /// String literal.
    String(String),
    /// Bytes literal.
    Bytes(Vec<u8>),
}

impl Constant {
    /// Convert the constant into a runtime value.
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::UInt(u) => Value::UInt(*u),
            Constant::Double(d) => Value::Double(*d),
            Constant::String(s) => Value::string(s.as_str()),
            Constant::Bytes(b) => Value::bytes(b.as_slice()),
        }
    }

    /// Convert a runtime value back into a constant, when the value is a
    /// literal kind.
    pub fn from_value(value: &Value) -> Option<Constant> {
        match value {
            Value::Null => Some(Constant::Null),
            Value::Bool(b) => Some(Constant::Bool(*b)),
            Value::Int(i) => Some(Constant::Int(*i)),
            Value::UInt(u) => Some(Constant::UInt(*u)),
            Value::Double(d) => Some(Constant::Double(*d)),
            Value::String(s) => Some(Constant::String(s.to_string())),
            Value::Bytes(b) => Some(Constant::Bytes(b.to_vec())),
            _ => None,
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// Stable node id.
    pub id: ExprId,
    /// Node kind and children.
    pub kind: ExprKind,
}

/// Expression node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal constant.
    Const(Constant),
    /// Simple or namespaced identifier.
    Ident(String),
    /// Field selection or presence test (`operand.field`).
    Select {
        /// The operand being selected from.
        operand: Box<Expr>,
        /// The field name.
        field: String,
        /// True for `has(operand.field)` presence tests.
        test_only: bool,
    },
    /// Function or operator call.
    Call {
        /// Receiver for member-style calls, None for global calls.
        target: Option<Box<Expr>>,
        /// Function name.
        function: String,
        /// Call arguments, not counting the target.
        args: Vec<Expr>,
    },
    /// List construction.
    List {
        /// Element expressions.
        elements: Vec<Expr>,
    },
    /// Map construction.
    Map {
        /// Entry expressions.
        entries: Vec<MapEntryExpr>,
    },
    /// Struct (message) construction.
    Struct {
        /// The declared type name, resolved against the container.
        type_name: String,
        /// Field initializers.
        fields: Vec<StructFieldExpr>,
    },
    /// Fold over an iterable range (`all`, `exists`, `map`, `filter`
    /// macros expand to this form).
    Comprehension(Box<ComprehensionExpr>),
}

/// A key/value entry in a map construction expression.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntryExpr {
    /// Entry node id.
    pub id: ExprId,
    /// Key expression.
    pub key: Expr,
    /// Value expression.
    pub value: Expr,
}

/// A field initializer in a struct construction expression.
#[derive(Debug, Clone, PartialEq)]
pub struct StructFieldExpr {
    /// Field node id.
    pub id: ExprId,
    /// Field name.
    pub field: String,
    /// Value expression.
    pub value: Expr,
}

/// A bounded fold over a list or map.
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionExpr {
    /// Name bound to each range element.
    pub iter_var: String,
    /// The range expression, must evaluate to a list or map.
    pub iter_range: Expr,
    /// Name bound to the accumulator.
    pub accu_var: String,
    /// Initial accumulator value.
    pub accu_init: Expr,
    /// Evaluated before each iteration. A false result stops the loop.
    pub loop_condition: Expr,
    /// Produces the next accumulator value.
    pub loop_step: Expr,
    /// Evaluated once with the final accumulator binding.
    pub result: Expr,
}

impl Expr {
    /// A constant literal node.
    pub fn literal(id: ExprId, constant: Constant) -> Expr {
        Expr {
            id,
            kind: ExprKind::Const(constant),
        }
    }

    /// An identifier node.
    pub fn ident(id: ExprId, name: impl Into<String>) -> Expr {
        Expr {
            id,
            kind: ExprKind::Ident(name.into()),
        }
    }

    /// A field selection node.
    pub fn select(id: ExprId, operand: Expr, field: impl Into<String>) -> Expr {
        Expr {
            id,
            kind: ExprKind::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: false,
            },
        }
    }

    /// A presence test node (`has(operand.field)`).
    pub fn presence_test(id: ExprId, operand: Expr, field: impl Into<String>) -> Expr {
        Expr {
            id,
            kind: ExprKind::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: true,
            },
        }
    }

    /// A global (function-style) call node.
    pub fn global_call(id: ExprId, function: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr {
            id,
            kind: ExprKind::Call {
                target: None,
                function: function.into(),
                args,
            },
        }
    }

    /// A member (receiver-style) call node.
    pub fn member_call(
        id: ExprId,
        target: Expr,
        function: impl Into<String>,
        args: Vec<Expr>,
    ) -> Expr {
        Expr {
            id,
            kind: ExprKind::Call {
                target: Some(Box::new(target)),
                function: function.into(),
                args,
            },
        }
    }

    /// A list construction node.
    pub fn list_expr(id: ExprId, elements: Vec<Expr>) -> Expr {
        Expr {
            id,
            kind: ExprKind::List { elements },
        }
    }

    /// A map construction node.
    pub fn map_expr(id: ExprId, entries: Vec<MapEntryExpr>) -> Expr {
        Expr {
            id,
            kind: ExprKind::Map { entries },
        }
    }

    /// The largest id used anywhere in this tree.
    pub fn max_id(&self) -> ExprId {
        let mut max = self.id;
        let mut consider = |candidate: ExprId| {
            if candidate > max {
                max = candidate;
            }
        };
        match &self.kind {
            ExprKind::Const(_) | ExprKind::Ident(_) => {}
            ExprKind::Select { operand, .. } => consider(operand.max_id()),
            ExprKind::Call { target, args, .. } => {
                if let Some(t) = target {
                    consider(t.max_id());
                }
                for a in args {
                    consider(a.max_id());
                }
            }
            ExprKind::List { elements } => {
                for e in elements {
                    consider(e.max_id());
                }
            }
            ExprKind::Map { entries } => {
                for entry in entries {
                    consider(entry.id);
                    consider(entry.key.max_id());
                    consider(entry.value.max_id());
                }
            }
            ExprKind::Struct { fields, .. } => {
                for field in fields {
                    consider(field.id);
                    consider(field.value.max_id());
                }
            }
            ExprKind::Comprehension(c) => {
                consider(c.iter_range.max_id());
                consider(c.accu_init.max_id());
                consider(c.loop_condition.max_id());
                consider(c.loop_step.max_id());
                consider(c.result.max_id());
            }
        }
        max
    }
}

/// A checker-resolved reference for an expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Fully qualified name of the variable, function or type.
    pub name: String,
    /// Candidate overload ids for call nodes.
    pub overload_ids: Vec<String>,
    /// Constant value for enum references.
    pub value: Option<Constant>,
}

impl Reference {
    /// A reference to a variable or type by fully qualified name.
    pub fn ident(name: impl Into<String>) -> Reference {
        Reference {
            name: name.into(),
            overload_ids: Vec::new(),
            value: None,
        }
    }
}

/// Checker output mapping expression ids to resolved references.
pub type ReferenceMap = HashMap<ExprId, Reference>;

/// Checker output mapping expression ids to their static types.
pub type TypeMap = HashMap<ExprId, TypeValue>;
