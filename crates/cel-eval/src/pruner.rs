//! AST pruning from observed evaluation state.
//!
//! After an observed (exhaustive) evaluation over a partial activation,
//! the recorded state holds a concrete value for every subexpression
//! that did not depend on an unknown input. Pruning folds those values
//! back into the AST as literals, leaving a residual expression over
//! the still-unknown inputs. The residual can be re-planned and
//! evaluated once more inputs arrive.
//!
//! Nodes introduced by pruning get fresh ids above every id in the
//! input tree and the recorded state, so pruning is idempotent: a
//! second pass with the same state finds nothing new to fold.

use cel_value::Value;

use crate::ast::{Constant, Expr, ExprId, ExprKind, MapEntryExpr};
use crate::operators;
use crate::state::EvalState;

/// Fold recorded results into the AST, returning the residual tree.
pub fn prune_ast(expr: &Expr, state: &EvalState) -> Expr {
    let recorded_max = state.ids().into_iter().max().unwrap_or(0);
    let mut next_id = expr.max_id().max(recorded_max) + 1;
    prune_expr(expr, state, &mut next_id)
}

fn fresh(next_id: &mut ExprId) -> ExprId {
    let id = *next_id;
    *next_id += 1;
    id
}

fn recorded_concrete(state: &EvalState, id: ExprId) -> bool {
    state
        .value(id)
        .map(|v| !v.is_unknown_or_error())
        .unwrap_or(false)
}

fn prune_expr(expr: &Expr, state: &EvalState, next_id: &mut ExprId) -> Expr {
    if let Some(value) = state.value(expr.id) {
        if !value.is_unknown_or_error() {
            if let Some(literal) = value_to_expr(&value, next_id) {
                return literal;
            }
        }
    }

    match &expr.kind {
        ExprKind::Const(_) | ExprKind::Ident(_) => expr.clone(),
        ExprKind::Select {
            operand,
            field,
            test_only,
        } => Expr {
            id: expr.id,
            kind: ExprKind::Select {
                operand: Box::new(prune_expr(operand, state, next_id)),
                field: field.clone(),
                test_only: *test_only,
            },
        },
        ExprKind::Call {
            target,
            function,
            args,
        } => prune_call(expr, target.as_deref(), function, args, state, next_id),
        ExprKind::List { elements } => Expr {
            id: expr.id,
            kind: ExprKind::List {
                elements: elements
                    .iter()
                    .map(|e| prune_expr(e, state, next_id))
                    .collect(),
            },
        },
        ExprKind::Map { entries } => Expr {
            id: expr.id,
            kind: ExprKind::Map {
                entries: entries
                    .iter()
                    .map(|entry| MapEntryExpr {
                        id: entry.id,
                        key: prune_expr(&entry.key, state, next_id),
                        value: prune_expr(&entry.value, state, next_id),
                    })
                    .collect(),
            },
        },
        // Struct construction is left intact: partially-built messages
        // have no literal form.
        ExprKind::Struct { .. } => expr.clone(),
        ExprKind::Comprehension(fold) => {
            // Only the range is pruned; the loop variables have no
            // meaning outside one evaluation.
            let mut pruned = (**fold).clone();
            pruned.iter_range = prune_expr(&fold.iter_range, state, next_id);
            Expr {
                id: expr.id,
                kind: ExprKind::Comprehension(Box::new(pruned)),
            }
        }
    }
}

fn prune_call(
    expr: &Expr,
    target: Option<&Expr>,
    function: &str,
    args: &[Expr],
    state: &EvalState,
    next_id: &mut ExprId,
) -> Expr {
    // An undetermined and/or hinged on one side: the side with a
    // recorded boolean was not decisive, so the residual is the other
    // operand alone.
    if (function == operators::LOGICAL_AND || function == operators::LOGICAL_OR)
        && args.len() == 2
    {
        let lhs_known = recorded_concrete(state, args[0].id);
        let rhs_known = recorded_concrete(state, args[1].id);
        if lhs_known && !rhs_known {
            return prune_expr(&args[1], state, next_id);
        }
        if rhs_known && !lhs_known {
            return prune_expr(&args[0], state, next_id);
        }
    }

    // A ternary with a recorded condition reduces to the taken branch.
    if function == operators::CONDITIONAL && args.len() == 3 {
        if let Some(Value::Bool(cond)) = state.value(args[0].id) {
            let branch = if cond { &args[1] } else { &args[2] };
            return prune_expr(branch, state, next_id);
        }
    }

    Expr {
        id: expr.id,
        kind: ExprKind::Call {
            target: target.map(|t| Box::new(prune_expr(t, state, next_id))),
            function: function.to_string(),
            args: args.iter().map(|a| prune_expr(a, state, next_id)).collect(),
        },
    }
}

/// A literal expression for a recorded value, when one exists.
fn value_to_expr(value: &Value, next_id: &mut ExprId) -> Option<Expr> {
    if let Some(constant) = Constant::from_value(value) {
        return Some(Expr::literal(fresh(next_id), constant));
    }
    match value {
        Value::List(elements) => {
            let mut exprs = Vec::with_capacity(elements.len());
            for element in elements.iter() {
                exprs.push(value_to_expr(element, next_id)?);
            }
            Some(Expr::list_expr(fresh(next_id), exprs))
        }
        Value::Map(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, entry_value) in map.iter() {
                let key_expr = value_to_expr(&key.to_value(), next_id)?;
                let value_expr = value_to_expr(entry_value, next_id)?;
                entries.push(MapEntryExpr {
                    id: fresh(next_id),
                    key: key_expr,
                    value: value_expr,
                });
            }
            Some(Expr::map_expr(fresh(next_id), entries))
        }
        _ => None,
    }
}
