//! Plan-time tree rewrites.
//!
//! Decorators run over every node the planner emits, children before
//! parents. Each decorator either returns the node unchanged, wraps it,
//! or replaces it with a cheaper equivalent. All decorators here are
//! idempotent so planning passes may re-apply them safely.

use std::collections::HashSet;
use std::sync::Arc;

use cel_value::{MapKey, Value};

use crate::activation::EmptyActivation;
use crate::attributes::Attribute;
use crate::error::PlanError;
use crate::interpretable::{
    EvalConst, EvalExhaustiveConditional, EvalSetMembership, EvalWatch, Interpretable,
};
use crate::operators;
use crate::state::EvalState;

/// A rewrite applied to each planned node.
pub type InterpretableDecorator =
    Box<dyn Fn(Interpretable) -> Result<Interpretable, PlanError> + Send + Sync>;

/// Wrap every node so its result is recorded in `state`.
///
/// Constants and attributes keep distinguishable wrappers so later
/// planning steps can still see through them.
pub fn observe_eval(state: Arc<EvalState>) -> InterpretableDecorator {
    Box::new(move |node| {
        Ok(match node {
            observed @ (Interpretable::WatchConst(_)
            | Interpretable::WatchAttr(_)
            | Interpretable::Watch(_)) => observed,
            constant @ Interpretable::Const(_) => {
                Interpretable::WatchConst(EvalWatch::new(constant, state.clone()))
            }
            attr @ Interpretable::Attr(_) => {
                Interpretable::WatchAttr(EvalWatch::new(attr, state.clone()))
            }
            other => Interpretable::Watch(EvalWatch::new(other, state.clone())),
        })
    })
}

/// Replace short-circuiting nodes with exhaustive ones.
///
/// Logical operators, folds and attribute-backed ternaries all evaluate
/// every operand, which is what observed evaluations ahead of pruning
/// need: the state table must hold a result for every reachable node.
pub fn disable_shortcircuits() -> InterpretableDecorator {
    Box::new(|node| {
        Ok(match node {
            Interpretable::Or(logic) => Interpretable::ExhaustiveOr(logic),
            Interpretable::And(logic) => Interpretable::ExhaustiveAnd(logic),
            Interpretable::Fold(fold) => Interpretable::ExhaustiveFold(fold),
            Interpretable::Attr(attr)
                if matches!(attr.attribute(), Attribute::Conditional(_)) =>
            {
                Interpretable::ExhaustiveConditional(EvalExhaustiveConditional {
                    id: attr.attribute.id(),
                    attribute: attr.attribute,
                    adapter: attr.adapter,
                })
            }
            other => other,
        })
    })
}

/// Fold constant subtrees and specialize constant-set membership.
///
/// - list and map constructions whose parts are all constants evaluate
///   once at plan time
/// - `x in [c1, c2, ...]` over a homogeneous constant list of primitive
///   values becomes a hashed set membership test
/// - type conversions of constants fold to their result
///
/// Constant evaluation that produces an error aborts planning, since
/// the expression could never evaluate successfully.
pub fn optimize() -> InterpretableDecorator {
    Box::new(|node| match node {
        Interpretable::List(list) if list.elements().iter().all(is_const) => {
            fold_constant(list.id, Interpretable::List(list))
        }
        Interpretable::Map(map)
            if map
                .entries()
                .iter()
                .all(|(k, v)| is_const(k) && is_const(v)) =>
        {
            fold_constant(map.id, Interpretable::Map(map))
        }
        Interpretable::Binary(call) if call.function() == operators::IN => {
            match constant_member_set(&call) {
                Some((member_type, value_set)) => {
                    Ok(Interpretable::SetMembership(EvalSetMembership {
                        id: call.id,
                        function: call.function,
                        arg: call.lhs,
                        member_type,
                        value_set,
                    }))
                }
                None => Ok(Interpretable::Binary(call)),
            }
        }
        Interpretable::Unary(call)
            if operators::is_type_conversion(&call.function)
                && call.implementation.is_some()
                && is_const(call.arg()) =>
        {
            fold_constant(call.id, Interpretable::Unary(call))
        }
        other => Ok(other),
    })
}

fn is_const(node: &Interpretable) -> bool {
    node.const_value().is_some()
}

fn fold_constant(id: i64, node: Interpretable) -> Result<Interpretable, PlanError> {
    match node.eval(&EmptyActivation) {
        Value::Error(e) => Err(PlanError::ConstantFolding((*e).clone())),
        value => Ok(Interpretable::Const(EvalConst::new(id, value))),
    }
}

/// The member type and hashed value set for a constant `@in` list, when
/// the list is non-empty, primitive and homogeneous.
fn constant_member_set(
    call: &crate::interpretable::EvalBinary,
) -> Option<(&'static str, HashSet<MapKey>)> {
    let elements = match call.rhs().const_value() {
        Some(Value::List(elements)) => elements,
        _ => return None,
    };
    let first = elements.first()?;
    let member_type = first.type_name();
    let mut value_set = HashSet::with_capacity(elements.len());
    for element in elements.iter() {
        if element.type_name() != member_type {
            return None;
        }
        value_set.insert(MapKey::from_value(element)?);
    }
    Some((member_type, value_set))
}
