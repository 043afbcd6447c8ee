//! Plan-time cost estimation.
//!
//! Costs are estimated from the planned tree without evaluating it. The
//! estimate brackets the number of elementary operations an evaluation
//! may perform: short-circuiting operators contribute a range, folds
//! have no static upper bound.

use crate::interpretable::Interpretable;

/// Unbounded upper cost, used for folds over runtime-sized ranges.
pub const COST_UNBOUNDED: u64 = u64::MAX;

/// A bracketed operation count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cost {
    /// Operations performed on the cheapest path.
    pub min: u64,
    /// Operations performed on the most expensive path.
    pub max: u64,
}

impl Cost {
    /// An exact cost.
    pub fn of(n: u64) -> Cost {
        Cost { min: n, max: n }
    }

    /// A cost with no static upper bound.
    pub fn unbounded(min: u64) -> Cost {
        Cost {
            min,
            max: COST_UNBOUNDED,
        }
    }
}

impl std::ops::Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost {
            min: self.min.saturating_add(rhs.min),
            max: self.max.saturating_add(rhs.max),
        }
    }
}

impl std::ops::Mul for Cost {
    type Output = Cost;

    fn mul(self, rhs: Cost) -> Cost {
        Cost {
            min: self.min.saturating_mul(rhs.min),
            // An unbounded factor keeps the product unbounded even
            // against a zero bound on the other side.
            max: if self.max == COST_UNBOUNDED || rhs.max == COST_UNBOUNDED {
                COST_UNBOUNDED
            } else {
                self.max.saturating_mul(rhs.max)
            },
        }
    }
}

/// Estimate the evaluation cost of a planned node.
pub fn estimate_cost(node: &Interpretable) -> Cost {
    match node {
        Interpretable::Const(_) => Cost::default(),
        Interpretable::Attr(attr) => attr.attribute().cost(),
        Interpretable::Or(op) | Interpretable::And(op) => {
            // Short-circuit: the rhs may not run at all.
            let lhs = estimate_cost(op.lhs());
            let rhs = estimate_cost(op.rhs());
            Cost {
                min: lhs.min,
                max: lhs.max.saturating_add(rhs.max),
            }
        }
        Interpretable::ExhaustiveOr(op) | Interpretable::ExhaustiveAnd(op) => {
            estimate_cost(op.lhs()) + estimate_cost(op.rhs())
        }
        Interpretable::Eq(op) => Cost::of(1) + estimate_cost(op.lhs()) + estimate_cost(op.rhs()),
        Interpretable::Ne(op) => Cost::of(1) + estimate_cost(op.lhs()) + estimate_cost(op.rhs()),
        Interpretable::Zero(_) => Cost::of(1),
        Interpretable::Unary(op) => Cost::of(1) + estimate_cost(op.arg()),
        Interpretable::Binary(op) => {
            Cost::of(1) + estimate_cost(op.lhs()) + estimate_cost(op.rhs())
        }
        Interpretable::VarArgs(op) => op
            .args()
            .iter()
            .fold(Cost::of(1), |acc, arg| acc + estimate_cost(arg)),
        Interpretable::List(op) => op
            .elements()
            .iter()
            .fold(Cost::of(1), |acc, e| acc + estimate_cost(e)),
        Interpretable::Map(op) => op.entries().iter().fold(Cost::of(1), |acc, (k, v)| {
            acc + estimate_cost(k) + estimate_cost(v)
        }),
        Interpretable::Obj(op) => op
            .fields()
            .iter()
            .fold(Cost::of(1), |acc, (_, v)| acc + estimate_cost(v)),
        Interpretable::Fold(fold) | Interpretable::ExhaustiveFold(fold) => {
            // The range length is unknown until evaluation.
            let fixed = estimate_cost(fold.iter_range()) + estimate_cost(fold.accu_init());
            Cost::unbounded(fixed.min)
        }
        Interpretable::TestOnly(op) => Cost::of(1) + estimate_cost(op.operand()),
        Interpretable::SetMembership(op) => Cost::of(1) + estimate_cost(op.arg()),
        Interpretable::ExhaustiveConditional(op) => op.attribute().cost(),
        Interpretable::WatchConst(watch)
        | Interpretable::WatchAttr(watch)
        | Interpretable::Watch(watch) => estimate_cost(watch.inner()),
    }
}
