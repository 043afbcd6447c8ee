//! Planned programs.

use cel_value::Value;

use crate::activation::{Activation, EmptyActivation};
use crate::cost::{estimate_cost, Cost};
use crate::interpretable::Interpretable;

/// A planned expression, ready for repeated evaluation.
///
/// Planning happens once; the program may then be evaluated many times
/// against different activations, including concurrently.
pub struct Program {
    plan: Interpretable,
}

impl Program {
    /// Wrap a planned node tree.
    pub fn new(plan: Interpretable) -> Self {
        Self { plan }
    }

    /// Evaluate against the given variable bindings.
    pub fn eval(&self, vars: &dyn Activation) -> Value {
        self.plan.eval(vars)
    }

    /// Evaluate with no variable bindings.
    pub fn eval_empty(&self) -> Value {
        self.plan.eval(&EmptyActivation)
    }

    /// Bracketed evaluation cost estimate.
    pub fn cost(&self) -> Cost {
        estimate_cost(&self.plan)
    }

    /// The planned root node.
    pub fn plan(&self) -> &Interpretable {
        &self.plan
    }
}
