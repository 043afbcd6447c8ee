//! Planning and evaluation engine for CEL expressions.
//!
//! The engine compiles a checked (or unchecked) AST into a tree of
//! [`Interpretable`] nodes once, then evaluates that tree repeatedly
//! against [`Activation`] variable bindings:
//!
//! - [`Planner`] walks the AST bottom-up and emits one node per
//!   expression, resolving identifiers and call overloads at plan time
//! - [`Attribute`]s model variable plus qualifier paths (`a.b[2].c`)
//!   with late-bound namespace resolution
//! - decorators rewrite the planned tree for observation
//!   ([`observe_eval`]), exhaustive evaluation
//!   ([`disable_shortcircuits`]) and constant folding ([`optimize`])
//! - [`EvalState`] records per-node results and [`prune_ast`] folds
//!   them back into a residual AST for iterative re-evaluation
//! - partial activations declare [`AttributePattern`]s whose matching
//!   attributes resolve to `Value::Unknown` instead of failing
//!
//! Evaluation never panics for language-level failures: errors and
//! unknowns travel as values through every operator.

mod activation;
mod ast;
mod attribute_patterns;
mod attributes;
mod container;
mod cost;
mod decorators;
mod dispatcher;
mod error;
mod interpretable;
mod planner;
mod program;
mod provider;
mod pruner;
mod state;

pub mod operators;

pub use activation::{
    Activation, EmptyActivation, FunctionActivation, HierarchicalActivation, MapActivation,
    PartialActivation, VarActivation,
};
pub use ast::{
    ComprehensionExpr, Constant, Expr, ExprId, ExprKind, MapEntryExpr, Reference, ReferenceMap,
    StructFieldExpr, TypeMap,
};
pub use attribute_patterns::{AttributePattern, QualifierPattern};
pub use attributes::{
    AbsoluteAttribute, Attribute, AttributeFactory, ConditionalAttribute, MaybeAttribute,
    Qualifier, RelativeAttribute,
};
pub use container::Container;
pub use cost::{estimate_cost, Cost, COST_UNBOUNDED};
pub use decorators::{disable_shortcircuits, observe_eval, optimize, InterpretableDecorator};
pub use dispatcher::{BinaryOp, Dispatcher, FunctionOp, Overload, UnaryOp};
pub use error::PlanError;
pub use interpretable::{
    EvalAttr, EvalBinary, EvalConst, EvalEquality, EvalExhaustiveConditional, EvalFold, EvalList,
    EvalLogic, EvalMap, EvalObj, EvalSetMembership, EvalTestOnly, EvalUnary, EvalVarArgs,
    EvalWatch, EvalZeroArity, Interpretable,
};
pub use planner::Planner;
pub use program::Program;
pub use provider::{default_adapter, FieldType, TypeAdapter, TypeProvider, TypeRegistry};
pub use pruner::prune_ast;
pub use state::EvalState;
