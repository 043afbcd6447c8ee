//! Function overload registration and lookup.

use std::collections::HashMap;
use std::sync::Arc;

use cel_value::{Value, ValueTrait};

use crate::error::PlanError;

/// Implementation of a variadic overload.
pub type FunctionOp = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;
/// Implementation of a unary overload.
pub type UnaryOp = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
/// Implementation of a binary overload.
pub type BinaryOp = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// A named function overload.
///
/// An overload may carry a unary, binary or variadic implementation.
/// An overload with no implementation is a declaration only: calls plan
/// against it but fail at runtime with a no matching overload error.
#[derive(Clone)]
pub struct Overload {
    /// Function name the overload answers to.
    pub name: String,
    /// Capability the first argument must advertise, if any.
    pub operand_trait: Option<ValueTrait>,
    /// Whether the implementation accepts unknown and error arguments
    /// instead of having them propagate past it.
    pub non_strict: bool,
    /// Unary implementation.
    pub unary: Option<UnaryOp>,
    /// Binary implementation.
    pub binary: Option<BinaryOp>,
    /// Variadic implementation.
    pub function: Option<FunctionOp>,
}

impl Overload {
    /// A unary overload.
    pub fn unary(name: impl Into<String>, op: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            operand_trait: None,
            non_strict: false,
            unary: Some(Arc::new(op)),
            binary: None,
            function: None,
        }
    }

    /// A binary overload.
    pub fn binary(
        name: impl Into<String>,
        op: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            operand_trait: None,
            non_strict: false,
            unary: None,
            binary: Some(Arc::new(op)),
            function: None,
        }
    }

    /// A variadic overload.
    pub fn function(
        name: impl Into<String>,
        op: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            operand_trait: None,
            non_strict: false,
            unary: None,
            binary: None,
            function: Some(Arc::new(op)),
        }
    }

    /// Require the first argument to advertise a capability.
    pub fn with_operand_trait(mut self, t: ValueTrait) -> Self {
        self.operand_trait = Some(t);
        self
    }

    /// Let unknown and error arguments reach the implementation.
    pub fn non_strict(mut self) -> Self {
        self.non_strict = true;
        self
    }
}

/// Maps function names to overloads, with an optional parent to fall
/// back to. Extending a shared base dispatcher never mutates it.
#[derive(Clone, Default)]
pub struct Dispatcher {
    parent: Option<Arc<Dispatcher>>,
    overloads: HashMap<String, Overload>,
}

impl Dispatcher {
    /// An empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// A child dispatcher that falls back to `parent` on lookup misses.
    pub fn with_parent(parent: Arc<Dispatcher>) -> Self {
        Self {
            parent: Some(parent),
            overloads: HashMap::new(),
        }
    }

    /// Register an overload. Redefining a name already present in this
    /// dispatcher (not a parent) is an error.
    pub fn add(&mut self, overload: Overload) -> Result<(), PlanError> {
        if self.overloads.contains_key(&overload.name) {
            return Err(PlanError::OverloadRedefinition(overload.name));
        }
        self.overloads.insert(overload.name.clone(), overload);
        Ok(())
    }

    /// Register several overloads.
    pub fn add_all(&mut self, overloads: Vec<Overload>) -> Result<(), PlanError> {
        for overload in overloads {
            self.add(overload)?;
        }
        Ok(())
    }

    /// Look up an overload by function name, consulting parents on a
    /// miss. Child registrations shadow parent ones.
    pub fn find_overload(&self, name: &str) -> Option<&Overload> {
        match self.overloads.get(name) {
            Some(overload) => Some(overload),
            None => self.parent.as_deref()?.find_overload(name),
        }
    }

    /// Names registered in this dispatcher and its parents.
    pub fn overload_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.overloads.keys().map(String::as_str).collect();
        if let Some(parent) = &self.parent {
            for name in parent.overload_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}
