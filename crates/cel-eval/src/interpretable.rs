//! Compiled expression nodes.
//!
//! The planner emits one `Interpretable` per AST node. Nodes carry the
//! originating expression id and evaluate against an activation. All
//! language-level failures come back as `Value::Error`, and operators
//! inspect their operands for the `Error` and `Unknown` sentinels and
//! propagate or absorb them per their own semantics.

use std::collections::HashSet;
use std::sync::Arc;

use cel_value::{EvalError, MapKey, Value, ValueMap, ValueTrait};

use crate::activation::{Activation, VarActivation};
use crate::attributes::Attribute;
use crate::dispatcher::{BinaryOp, FunctionOp, UnaryOp};
use crate::operators;
use crate::provider::{FieldType, TypeAdapter, TypeProvider};
use crate::state::EvalState;

/// A planned, evaluable expression node.
#[derive(Clone)]
pub enum Interpretable {
    /// A plan-time constant.
    Const(EvalConst),
    /// An attribute resolution.
    Attr(EvalAttr),
    /// Short-circuiting logical and.
    And(EvalLogic),
    /// Short-circuiting logical or.
    Or(EvalLogic),
    /// Logical and evaluating both operands.
    ExhaustiveAnd(EvalLogic),
    /// Logical or evaluating both operands.
    ExhaustiveOr(EvalLogic),
    /// Equality.
    Eq(EvalEquality),
    /// Inequality.
    Ne(EvalEquality),
    /// Zero-argument call.
    Zero(EvalZeroArity),
    /// Unary call.
    Unary(EvalUnary),
    /// Binary call.
    Binary(EvalBinary),
    /// Call with three or more arguments.
    VarArgs(EvalVarArgs),
    /// List construction.
    List(EvalList),
    /// Map construction.
    Map(EvalMap),
    /// Struct construction.
    Obj(EvalObj),
    /// Bounded fold with loop-condition short-circuiting.
    Fold(EvalFold),
    /// Bounded fold visiting every range element.
    ExhaustiveFold(EvalFold),
    /// Field presence test.
    TestOnly(EvalTestOnly),
    /// Membership test against a plan-time constant set.
    SetMembership(EvalSetMembership),
    /// Ternary over attributes evaluating both branches.
    ExhaustiveConditional(EvalExhaustiveConditional),
    /// State-recording wrapper over a constant.
    WatchConst(EvalWatch),
    /// State-recording wrapper over an attribute.
    WatchAttr(EvalWatch),
    /// State-recording wrapper over any other node.
    Watch(EvalWatch),
}

impl Interpretable {
    /// The originating expression id.
    pub fn id(&self) -> i64 {
        match self {
            Interpretable::Const(n) => n.id,
            Interpretable::Attr(n) => n.attribute.id(),
            Interpretable::And(n)
            | Interpretable::Or(n)
            | Interpretable::ExhaustiveAnd(n)
            | Interpretable::ExhaustiveOr(n) => n.id,
            Interpretable::Eq(n) | Interpretable::Ne(n) => n.id,
            Interpretable::Zero(n) => n.id,
            Interpretable::Unary(n) => n.id,
            Interpretable::Binary(n) => n.id,
            Interpretable::VarArgs(n) => n.id,
            Interpretable::List(n) => n.id,
            Interpretable::Map(n) => n.id,
            Interpretable::Obj(n) => n.id,
            Interpretable::Fold(n) | Interpretable::ExhaustiveFold(n) => n.id,
            Interpretable::TestOnly(n) => n.id,
            Interpretable::SetMembership(n) => n.id,
            Interpretable::ExhaustiveConditional(n) => n.id,
            Interpretable::WatchConst(n)
            | Interpretable::WatchAttr(n)
            | Interpretable::Watch(n) => n.inner.id(),
        }
    }

    /// Evaluate the node against the given variable bindings.
    pub fn eval(&self, vars: &dyn Activation) -> Value {
        match self {
            Interpretable::Const(n) => n.value.clone(),
            Interpretable::Attr(n) => n.eval(vars),
            Interpretable::And(n) => n.eval(vars, false, false),
            Interpretable::Or(n) => n.eval(vars, true, false),
            Interpretable::ExhaustiveAnd(n) => n.eval(vars, false, true),
            Interpretable::ExhaustiveOr(n) => n.eval(vars, true, true),
            Interpretable::Eq(n) => n.eval(vars, false),
            Interpretable::Ne(n) => n.eval(vars, true),
            Interpretable::Zero(n) => n.eval(),
            Interpretable::Unary(n) => n.eval(vars),
            Interpretable::Binary(n) => n.eval(vars),
            Interpretable::VarArgs(n) => n.eval(vars),
            Interpretable::List(n) => n.eval(vars),
            Interpretable::Map(n) => n.eval(vars),
            Interpretable::Obj(n) => n.eval(vars),
            Interpretable::Fold(n) => n.eval(vars, false),
            Interpretable::ExhaustiveFold(n) => n.eval(vars, true),
            Interpretable::TestOnly(n) => n.eval(vars),
            Interpretable::SetMembership(n) => n.eval(vars),
            Interpretable::ExhaustiveConditional(n) => n.eval(vars),
            Interpretable::WatchConst(n)
            | Interpretable::WatchAttr(n)
            | Interpretable::Watch(n) => n.eval(vars),
        }
    }

    /// The constant value, when the node is a planned constant.
    pub fn const_value(&self) -> Option<&Value> {
        match self {
            Interpretable::Const(n) => Some(&n.value),
            Interpretable::WatchConst(n) => n.inner.const_value(),
            _ => None,
        }
    }

    /// Attribute view of this node, reaching through observers.
    pub fn as_attr(&self) -> Option<&EvalAttr> {
        match self {
            Interpretable::Attr(n) => Some(n),
            Interpretable::WatchAttr(n) => n.inner.as_attr(),
            _ => None,
        }
    }

    /// Mutable attribute view of this node, reaching through observers.
    pub fn as_attr_mut(&mut self) -> Option<&mut EvalAttr> {
        match self {
            Interpretable::Attr(n) => Some(n),
            Interpretable::WatchAttr(n) => n.inner.as_attr_mut(),
            _ => None,
        }
    }
}

// ==================== Const / Attr ====================

/// A plan-time constant.
#[derive(Clone)]
pub struct EvalConst {
    pub(crate) id: i64,
    pub(crate) value: Value,
}

impl EvalConst {
    pub(crate) fn new(id: i64, value: Value) -> Self {
        Self { id, value }
    }
}

/// An attribute resolution node.
#[derive(Clone)]
pub struct EvalAttr {
    pub(crate) attribute: Attribute,
    pub(crate) adapter: TypeAdapter,
}

impl EvalAttr {
    pub(crate) fn new(attribute: Attribute, adapter: TypeAdapter) -> Self {
        Self { attribute, adapter }
    }

    /// The attribute this node resolves.
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    /// Mutable access for the planner to extend the qualifier path.
    pub(crate) fn attribute_mut(&mut self) -> &mut Attribute {
        &mut self.attribute
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        finish_resolution(self.attribute.try_resolve(vars), &self.attribute, &self.adapter)
    }
}

fn finish_resolution(
    resolved: Result<Option<Value>, EvalError>,
    attribute: &Attribute,
    adapter: &TypeAdapter,
) -> Value {
    match resolved {
        Ok(Some(value)) => {
            if value.is_unknown_or_error() {
                value
            } else {
                (adapter)(value)
            }
        }
        Ok(None) => Value::error(EvalError::no_such_attribute(&attribute.to_string())),
        Err(e) => Value::error(e),
    }
}

// ==================== Logic ====================

/// Operands of a logical and/or node.
#[derive(Clone)]
pub struct EvalLogic {
    pub(crate) id: i64,
    pub(crate) lhs: Box<Interpretable>,
    pub(crate) rhs: Box<Interpretable>,
}

impl EvalLogic {
    pub(crate) fn new(id: i64, lhs: Interpretable, rhs: Interpretable) -> Self {
        Self {
            id,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Left operand.
    pub fn lhs(&self) -> &Interpretable {
        &self.lhs
    }

    /// Right operand.
    pub fn rhs(&self) -> &Interpretable {
        &self.rhs
    }

    fn eval(&self, vars: &dyn Activation, is_or: bool, exhaustive: bool) -> Value {
        let decisive = Value::Bool(is_or);
        let lhs = self.lhs.eval(vars);
        if !exhaustive && lhs == decisive {
            return lhs;
        }
        let rhs = self.rhs.eval(vars);
        combine_logic(lhs, rhs, is_or)
    }
}

/// Commutative three-valued combine for and/or.
///
/// A decisive boolean wins over unknowns and errors on the other side.
/// Unknowns beat errors, and the merged unknown carries both id sets.
fn combine_logic(lhs: Value, rhs: Value, is_or: bool) -> Value {
    let decisive = Value::Bool(is_or);
    if lhs == decisive || rhs == decisive {
        return decisive;
    }
    if let (Value::Bool(_), Value::Bool(_)) = (&lhs, &rhs) {
        return Value::Bool(!is_or);
    }
    if let Value::Unknown(mut l) = lhs {
        if let Value::Unknown(r) = &rhs {
            l.merge(r);
        }
        return Value::Unknown(l);
    }
    if rhs.is_unknown() {
        return rhs;
    }
    if lhs.is_error() {
        return lhs;
    }
    if rhs.is_error() {
        return rhs;
    }
    let op = if is_or {
        operators::LOGICAL_OR
    } else {
        operators::LOGICAL_AND
    };
    Value::error(EvalError::no_matching_overload(op))
}

// ==================== Equality ====================

/// Operands of an equality or inequality node.
#[derive(Clone)]
pub struct EvalEquality {
    pub(crate) id: i64,
    pub(crate) lhs: Box<Interpretable>,
    pub(crate) rhs: Box<Interpretable>,
}

impl EvalEquality {
    pub(crate) fn new(id: i64, lhs: Interpretable, rhs: Interpretable) -> Self {
        Self {
            id,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Left operand.
    pub fn lhs(&self) -> &Interpretable {
        &self.lhs
    }

    /// Right operand.
    pub fn rhs(&self) -> &Interpretable {
        &self.rhs
    }

    fn eval(&self, vars: &dyn Activation, negated: bool) -> Value {
        let lhs = self.lhs.eval(vars);
        if lhs.is_unknown_or_error() {
            return lhs;
        }
        let rhs = self.rhs.eval(vars);
        if rhs.is_unknown_or_error() {
            return rhs;
        }
        Value::Bool((lhs == rhs) != negated)
    }
}

// ==================== Calls ====================

/// A call with no arguments.
#[derive(Clone)]
pub struct EvalZeroArity {
    pub(crate) id: i64,
    pub(crate) function: String,
    pub(crate) implementation: Option<FunctionOp>,
}

impl EvalZeroArity {
    fn eval(&self) -> Value {
        match &self.implementation {
            Some(f) => f(&[]),
            None => Value::error(EvalError::no_matching_overload(&self.function)),
        }
    }
}

/// A call with one argument.
#[derive(Clone)]
pub struct EvalUnary {
    pub(crate) id: i64,
    pub(crate) function: String,
    pub(crate) arg: Box<Interpretable>,
    pub(crate) implementation: Option<UnaryOp>,
    pub(crate) operand_trait: Option<ValueTrait>,
    pub(crate) non_strict: bool,
}

impl EvalUnary {
    /// The call argument.
    pub fn arg(&self) -> &Interpretable {
        &self.arg
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let arg = self.arg.eval(vars);
        if !self.non_strict && arg.is_unknown_or_error() {
            return arg;
        }
        if let Some(t) = self.operand_trait {
            if !arg.has_trait(t) {
                return Value::error(EvalError::no_matching_overload(&self.function));
            }
        }
        match &self.implementation {
            Some(f) => f(&arg),
            None => Value::error(EvalError::no_matching_overload(&self.function)),
        }
    }
}

/// A call with two arguments.
#[derive(Clone)]
pub struct EvalBinary {
    pub(crate) id: i64,
    pub(crate) function: String,
    pub(crate) lhs: Box<Interpretable>,
    pub(crate) rhs: Box<Interpretable>,
    pub(crate) implementation: Option<BinaryOp>,
    pub(crate) operand_trait: Option<ValueTrait>,
    pub(crate) non_strict: bool,
}

impl EvalBinary {
    /// Left argument.
    pub fn lhs(&self) -> &Interpretable {
        &self.lhs
    }

    /// Right argument.
    pub fn rhs(&self) -> &Interpretable {
        &self.rhs
    }

    /// The function name this call dispatches to.
    pub fn function(&self) -> &str {
        &self.function
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let lhs = self.lhs.eval(vars);
        if !self.non_strict && lhs.is_unknown_or_error() {
            return lhs;
        }
        let rhs = self.rhs.eval(vars);
        if !self.non_strict && rhs.is_unknown_or_error() {
            return rhs;
        }
        if let Some(t) = self.operand_trait {
            if !lhs.has_trait(t) {
                return Value::error(EvalError::no_matching_overload(&self.function));
            }
        }
        match &self.implementation {
            Some(f) => f(&lhs, &rhs),
            None => Value::error(EvalError::no_matching_overload(&self.function)),
        }
    }
}

/// A call with three or more arguments.
#[derive(Clone)]
pub struct EvalVarArgs {
    pub(crate) id: i64,
    pub(crate) function: String,
    pub(crate) args: Vec<Interpretable>,
    pub(crate) implementation: Option<FunctionOp>,
    pub(crate) operand_trait: Option<ValueTrait>,
    pub(crate) non_strict: bool,
}

impl EvalVarArgs {
    /// The call arguments.
    pub fn args(&self) -> &[Interpretable] {
        &self.args
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            let value = arg.eval(vars);
            if !self.non_strict && value.is_unknown_or_error() {
                return value;
            }
            values.push(value);
        }
        if let (Some(t), Some(first)) = (self.operand_trait, values.first()) {
            if !first.has_trait(t) {
                return Value::error(EvalError::no_matching_overload(&self.function));
            }
        }
        match &self.implementation {
            Some(f) => f(&values),
            None => Value::error(EvalError::no_matching_overload(&self.function)),
        }
    }
}

// ==================== Aggregates ====================

/// List construction.
#[derive(Clone)]
pub struct EvalList {
    pub(crate) id: i64,
    pub(crate) elements: Vec<Interpretable>,
}

impl EvalList {
    /// Element expressions.
    pub fn elements(&self) -> &[Interpretable] {
        &self.elements
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let mut values = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            let value = element.eval(vars);
            if value.is_unknown_or_error() {
                return value;
            }
            values.push(value);
        }
        Value::list(values)
    }
}

/// Map construction.
#[derive(Clone)]
pub struct EvalMap {
    pub(crate) id: i64,
    pub(crate) entries: Vec<(Interpretable, Interpretable)>,
}

impl EvalMap {
    /// Key/value entry expressions.
    pub fn entries(&self) -> &[(Interpretable, Interpretable)] {
        &self.entries
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let mut map = ValueMap::new();
        for (key_expr, value_expr) in &self.entries {
            let key = key_expr.eval(vars);
            if key.is_unknown_or_error() {
                return key;
            }
            let value = value_expr.eval(vars);
            if value.is_unknown_or_error() {
                return value;
            }
            match MapKey::from_value(&key) {
                Some(map_key) => map.insert(map_key, value),
                None => {
                    return Value::error(EvalError::type_mismatch(
                        "map key",
                        key.type_name(),
                    ));
                }
            }
        }
        Value::map(map)
    }
}

/// Struct construction through the type provider.
#[derive(Clone)]
pub struct EvalObj {
    pub(crate) id: i64,
    pub(crate) type_name: String,
    pub(crate) fields: Vec<(String, Interpretable)>,
    pub(crate) provider: Arc<dyn TypeProvider>,
}

impl EvalObj {
    /// Field initializer expressions.
    pub fn fields(&self) -> &[(String, Interpretable)] {
        &self.fields
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let mut values = Vec::with_capacity(self.fields.len());
        for (field, expr) in &self.fields {
            let value = expr.eval(vars);
            if value.is_unknown_or_error() {
                return value;
            }
            values.push((field.clone(), value));
        }
        match self.provider.new_value(&self.type_name, values) {
            Ok(value) => value,
            Err(e) => Value::error(e),
        }
    }
}

// ==================== Fold ====================

/// A bounded fold over a list or the keys of a map.
#[derive(Clone)]
pub struct EvalFold {
    pub(crate) id: i64,
    pub(crate) iter_var: String,
    pub(crate) iter_range: Box<Interpretable>,
    pub(crate) accu_var: String,
    pub(crate) accu_init: Box<Interpretable>,
    pub(crate) loop_condition: Box<Interpretable>,
    pub(crate) loop_step: Box<Interpretable>,
    pub(crate) result: Box<Interpretable>,
}

impl EvalFold {
    /// The range expression.
    pub fn iter_range(&self) -> &Interpretable {
        &self.iter_range
    }

    /// The accumulator initializer.
    pub fn accu_init(&self) -> &Interpretable {
        &self.accu_init
    }

    fn eval(&self, vars: &dyn Activation, exhaustive: bool) -> Value {
        let range = self.iter_range.eval(vars);
        let elements: Vec<Value> = match &range {
            Value::List(elems) => elems.to_vec(),
            Value::Map(map) => map.keys().map(MapKey::to_value).collect(),
            Value::Unknown(_) | Value::Error(_) => return range,
            other => {
                return Value::error(EvalError::type_mismatch("list or map", other.type_name()));
            }
        };

        let mut accu = self.accu_init.eval(vars);
        if accu.is_error() {
            return accu;
        }

        // In exhaustive mode iterations past a false condition still run
        // for state recording, but their steps no longer commit, so the
        // final result matches the short-circuit fold.
        let mut folding = true;
        for element in elements {
            // Iteration scopes are rebuilt each pass so the step sees
            // the prior accumulator and the current element only.
            let accu_scope = VarActivation::new(vars, &self.accu_var, accu.clone());
            let iter_scope = VarActivation::new(&accu_scope, &self.iter_var, element);

            let cond = self.loop_condition.eval(&iter_scope);
            match cond {
                Value::Bool(false) => {
                    if !exhaustive {
                        break;
                    }
                    folding = false;
                }
                Value::Unknown(_) | Value::Error(_) if !exhaustive => return cond,
                _ => {}
            }

            let step = self.loop_step.eval(&iter_scope);
            if !exhaustive && step.is_error() {
                return step;
            }
            if folding {
                accu = step;
            }
        }

        let result_scope = VarActivation::new(vars, &self.accu_var, accu);
        self.result.eval(&result_scope)
    }
}

// ==================== TestOnly ====================

/// A `has(operand.field)` presence test.
#[derive(Clone)]
pub struct EvalTestOnly {
    pub(crate) id: i64,
    pub(crate) operand: Box<Interpretable>,
    pub(crate) field: String,
    pub(crate) field_type: Option<FieldType>,
}

impl EvalTestOnly {
    /// The operand being tested.
    pub fn operand(&self) -> &Interpretable {
        &self.operand
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let operand = self.operand.eval(vars);
        if operand.is_unknown_or_error() {
            return operand;
        }
        if let Some(field_type) = &self.field_type {
            return Value::Bool((field_type.is_set)(&operand));
        }
        match &operand {
            Value::Map(map) => {
                let key = MapKey::String(Arc::from(self.field.as_str()));
                Value::Bool(map.contains_key(&key))
            }
            other => Value::error(EvalError::type_mismatch("map", other.type_name())),
        }
    }
}

// ==================== SetMembership ====================

/// An `@in` call whose right side folded to a constant set.
#[derive(Clone)]
pub struct EvalSetMembership {
    pub(crate) id: i64,
    pub(crate) function: String,
    pub(crate) arg: Box<Interpretable>,
    pub(crate) member_type: &'static str,
    pub(crate) value_set: HashSet<MapKey>,
}

impl EvalSetMembership {
    /// The probe expression.
    pub fn arg(&self) -> &Interpretable {
        &self.arg
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let probe = self.arg.eval(vars);
        if probe.is_unknown_or_error() {
            return probe;
        }
        if probe.type_name() != self.member_type {
            return Value::error(EvalError::no_matching_overload(&self.function));
        }
        match MapKey::from_value(&probe) {
            Some(key) => Value::Bool(self.value_set.contains(&key)),
            None => Value::error(EvalError::no_matching_overload(&self.function)),
        }
    }
}

// ==================== ExhaustiveConditional ====================

/// A ternary over attributes that resolves both branches.
#[derive(Clone)]
pub struct EvalExhaustiveConditional {
    pub(crate) id: i64,
    pub(crate) attribute: Attribute,
    pub(crate) adapter: TypeAdapter,
}

impl EvalExhaustiveConditional {
    /// The underlying conditional attribute.
    pub fn attribute(&self) -> &Attribute {
        &self.attribute
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let cond = match &self.attribute {
            Attribute::Conditional(c) => c,
            other => return finish_resolution(other.try_resolve(vars), other, &self.adapter),
        };
        let test = cond.expr().eval(vars);
        let truthy = cond.truthy().try_resolve(vars);
        let falsy = cond.falsy().try_resolve(vars);
        match test {
            Value::Bool(true) => finish_resolution(truthy, cond.truthy(), &self.adapter),
            Value::Bool(false) => finish_resolution(falsy, cond.falsy(), &self.adapter),
            unknown @ Value::Unknown(_) => unknown,
            error @ Value::Error(_) => error,
            _ => Value::error(EvalError::no_matching_overload(operators::CONDITIONAL)),
        }
    }
}

// ==================== Watch ====================

/// Records the wrapped node's result in shared evaluation state.
#[derive(Clone)]
pub struct EvalWatch {
    pub(crate) inner: Box<Interpretable>,
    pub(crate) state: Arc<EvalState>,
}

impl EvalWatch {
    pub(crate) fn new(inner: Interpretable, state: Arc<EvalState>) -> Self {
        Self {
            inner: Box::new(inner),
            state,
        }
    }

    /// The wrapped node.
    pub fn inner(&self) -> &Interpretable {
        &self.inner
    }

    fn eval(&self, vars: &dyn Activation) -> Value {
        let value = self.inner.eval(vars);
        self.state.set_value(self.inner.id(), value.clone());
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::EmptyActivation;
    use cel_value::EvalErrorKind;

    fn constant(id: i64, value: Value) -> Interpretable {
        Interpretable::Const(EvalConst::new(id, value))
    }

    #[test]
    fn test_or_short_circuits_errors() {
        let lhs = constant(1, Value::Bool(true));
        let rhs = constant(2, Value::error(EvalError::no_such_key("x")));
        let or = Interpretable::Or(EvalLogic::new(3, lhs, rhs));
        assert_eq!(or.eval(&EmptyActivation), Value::Bool(true));
    }

    #[test]
    fn test_or_prefers_determinate_over_unknown() {
        // unknown || true is true regardless of operand order.
        let or = Interpretable::Or(EvalLogic::new(
            3,
            constant(1, Value::unknown(1)),
            constant(2, Value::Bool(true)),
        ));
        assert_eq!(or.eval(&EmptyActivation), Value::Bool(true));

        // false || unknown stays unknown.
        let or = Interpretable::Or(EvalLogic::new(
            3,
            constant(1, Value::Bool(false)),
            constant(2, Value::unknown(2)),
        ));
        assert!(or.eval(&EmptyActivation).is_unknown());
    }

    #[test]
    fn test_and_merges_unknown_ids() {
        let and = Interpretable::And(EvalLogic::new(
            3,
            constant(1, Value::unknown(1)),
            constant(2, Value::unknown(2)),
        ));
        match and.eval(&EmptyActivation) {
            Value::Unknown(u) => assert_eq!(u.ids(), &[1, 2]),
            other => panic!("expected unknown, got {}", other),
        }
    }

    #[test]
    fn test_and_error_operand() {
        let and = Interpretable::And(EvalLogic::new(
            3,
            constant(1, Value::error(EvalError::no_such_key("x"))),
            constant(2, Value::Bool(true)),
        ));
        assert!(and.eval(&EmptyActivation).is_error());

        // false absorbs the error.
        let and = Interpretable::And(EvalLogic::new(
            3,
            constant(1, Value::error(EvalError::no_such_key("x"))),
            constant(2, Value::Bool(false)),
        ));
        assert_eq!(and.eval(&EmptyActivation), Value::Bool(false));
    }

    #[test]
    fn test_eq_and_ne_complement() {
        for (l, r) in [
            (Value::Int(1), Value::Int(1)),
            (Value::Int(1), Value::Int(2)),
            (Value::Int(1), Value::UInt(1)),
        ] {
            let eq = Interpretable::Eq(EvalEquality::new(
                3,
                constant(1, l.clone()),
                constant(2, r.clone()),
            ));
            let ne = Interpretable::Ne(EvalEquality::new(4, constant(1, l), constant(2, r)));
            let eq_result = eq.eval(&EmptyActivation).as_bool().unwrap();
            let ne_result = ne.eval(&EmptyActivation).as_bool().unwrap();
            assert_ne!(eq_result, ne_result);
        }
    }

    #[test]
    fn test_eq_propagates_unknown_before_compare() {
        let eq = Interpretable::Eq(EvalEquality::new(
            3,
            constant(1, Value::unknown(1)),
            constant(2, Value::Int(1)),
        ));
        assert!(eq.eval(&EmptyActivation).is_unknown());
    }

    #[test]
    fn test_list_propagates_first_error() {
        let list = Interpretable::List(EvalList {
            id: 3,
            elements: vec![
                constant(1, Value::Int(1)),
                constant(2, Value::error(EvalError::no_such_key("k"))),
            ],
        });
        assert!(list.eval(&EmptyActivation).is_error());
    }

    #[test]
    fn test_map_rejects_bad_key_kind() {
        let map = Interpretable::Map(EvalMap {
            id: 3,
            entries: vec![(constant(1, Value::Double(1.0)), constant(2, Value::Int(1)))],
        });
        let result = map.eval(&EmptyActivation);
        match result {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::TypeMismatch),
            other => panic!("expected error, got {}", other),
        }
    }

    #[test]
    fn test_set_membership() {
        let mut value_set = HashSet::new();
        value_set.insert(MapKey::Int(1));
        value_set.insert(MapKey::Int(2));
        let node = Interpretable::SetMembership(EvalSetMembership {
            id: 3,
            function: operators::IN.to_string(),
            arg: Box::new(constant(1, Value::Int(2))),
            member_type: "int",
            value_set: value_set.clone(),
        });
        assert_eq!(node.eval(&EmptyActivation), Value::Bool(true));

        let miss = Interpretable::SetMembership(EvalSetMembership {
            id: 3,
            function: operators::IN.to_string(),
            arg: Box::new(constant(1, Value::Int(9))),
            member_type: "int",
            value_set: value_set.clone(),
        });
        assert_eq!(miss.eval(&EmptyActivation), Value::Bool(false));

        // A uint probe against an int set is an overload miss, not false.
        let wrong_kind = Interpretable::SetMembership(EvalSetMembership {
            id: 3,
            function: operators::IN.to_string(),
            arg: Box::new(constant(1, Value::UInt(2))),
            member_type: "int",
            value_set,
        });
        match wrong_kind.eval(&EmptyActivation) {
            Value::Error(e) => assert_eq!(e.kind, EvalErrorKind::NoMatchingOverload),
            other => panic!("expected error, got {}", other),
        }
    }

    #[test]
    fn test_watch_records_result() {
        let state = Arc::new(EvalState::new());
        let node = Interpretable::Watch(EvalWatch::new(constant(7, Value::Int(42)), state.clone()));
        assert_eq!(node.eval(&EmptyActivation), Value::Int(42));
        assert_eq!(state.value(7), Some(Value::Int(42)));
    }
}
