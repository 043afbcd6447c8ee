//! Variable bindings for evaluation.

use std::sync::{Arc, OnceLock};

use cel_value::Value;

use crate::attribute_patterns::AttributePattern;

// ==================== Activation trait ====================

/// Resolves variable names to values during evaluation.
///
/// Activations form a chain: a resolver that misses may delegate to its
/// parent. Implementations must be thread safe so a planned program can
/// be evaluated concurrently against different activations.
pub trait Activation: Send + Sync {
    /// Resolve a fully qualified variable name.
    fn resolve_name(&self, name: &str) -> Option<Value>;

    /// The next activation to consult, if any.
    fn parent(&self) -> Option<&dyn Activation> {
        None
    }

    /// Attribute patterns whose matching attributes resolve to unknown
    /// values. Empty for complete activations.
    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        &[]
    }
}

impl<T: Activation + ?Sized> Activation for &T {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        (**self).resolve_name(name)
    }

    fn parent(&self) -> Option<&dyn Activation> {
        (**self).parent()
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        (**self).unknown_attribute_patterns()
    }
}

impl<T: Activation + ?Sized> Activation for Box<T> {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        (**self).resolve_name(name)
    }

    fn parent(&self) -> Option<&dyn Activation> {
        (**self).parent()
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        (**self).unknown_attribute_patterns()
    }
}

impl<T: Activation + ?Sized> Activation for Arc<T> {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        (**self).resolve_name(name)
    }

    fn parent(&self) -> Option<&dyn Activation> {
        (**self).parent()
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        (**self).unknown_attribute_patterns()
    }
}

// ==================== EmptyActivation ====================

/// An activation with no bindings. Used for constant folding and for
/// programs over literal-only expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyActivation;

impl Activation for EmptyActivation {
    fn resolve_name(&self, _name: &str) -> Option<Value> {
        None
    }
}

// ==================== MapActivation ====================

enum Binding {
    Value(Value),
    Lazy {
        producer: Arc<dyn Fn() -> Value + Send + Sync>,
        cell: OnceLock<Value>,
    },
}

impl Binding {
    fn value(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Lazy { producer, cell } => cell.get_or_init(|| producer()).clone(),
        }
    }
}

/// An activation backed by a name to value table.
///
/// Bindings may be eager values or lazy producers. A lazy producer is
/// invoked at most once; the result is memoized for later lookups of the
/// same name.
#[derive(Default)]
pub struct MapActivation {
    bindings: std::collections::HashMap<String, Binding>,
}

impl MapActivation {
    /// Create an empty activation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name to a value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings
            .insert(name.into(), Binding::Value(value.into()));
    }

    /// Bind a name to a producer invoked on first resolution.
    pub fn insert_lazy(
        &mut self,
        name: impl Into<String>,
        producer: impl Fn() -> Value + Send + Sync + 'static,
    ) {
        self.bindings.insert(
            name.into(),
            Binding::Lazy {
                producer: Arc::new(producer),
                cell: OnceLock::new(),
            },
        );
    }
}

impl Activation for MapActivation {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).map(Binding::value)
    }
}

impl FromIterator<(String, Value)> for MapActivation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut activation = MapActivation::new();
        for (name, value) in iter {
            activation.insert(name, value);
        }
        activation
    }
}

// ==================== FunctionActivation ====================

/// An activation that delegates resolution to a closure.
#[derive(Clone)]
pub struct FunctionActivation {
    resolver: Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>,
}

impl FunctionActivation {
    /// Create an activation from a resolver function.
    pub fn new(resolver: impl Fn(&str) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl Activation for FunctionActivation {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        (self.resolver)(name)
    }
}

// ==================== HierarchicalActivation ====================

/// Chains two activations, consulting the child before the parent.
pub struct HierarchicalActivation<'a> {
    parent: &'a dyn Activation,
    child: &'a dyn Activation,
}

impl<'a> HierarchicalActivation<'a> {
    /// Chain `child` over `parent`.
    pub fn new(parent: &'a dyn Activation, child: &'a dyn Activation) -> Self {
        Self { parent, child }
    }
}

impl Activation for HierarchicalActivation<'_> {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        self.child
            .resolve_name(name)
            .or_else(|| self.parent.resolve_name(name))
    }

    fn parent(&self) -> Option<&dyn Activation> {
        Some(self.parent)
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        let child = self.child.unknown_attribute_patterns();
        if !child.is_empty() {
            child
        } else {
            self.parent.unknown_attribute_patterns()
        }
    }
}

// ==================== VarActivation ====================

/// Binds a single mutable variable over a parent activation.
///
/// Fold loops rebind the iteration and accumulator variables with this
/// type once per iteration instead of building a fresh map.
pub struct VarActivation<'a> {
    parent: &'a dyn Activation,
    name: &'a str,
    value: Value,
}

impl<'a> VarActivation<'a> {
    /// Bind `name` to `value` over `parent`.
    pub fn new(parent: &'a dyn Activation, name: &'a str, value: Value) -> Self {
        Self {
            parent,
            name,
            value,
        }
    }

    /// Replace the bound value.
    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }
}

impl Activation for VarActivation<'_> {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        if name == self.name {
            Some(self.value.clone())
        } else {
            self.parent.resolve_name(name)
        }
    }

    fn parent(&self) -> Option<&dyn Activation> {
        Some(self.parent)
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        self.parent.unknown_attribute_patterns()
    }
}

// ==================== PartialActivation ====================

/// Wraps an activation with attribute patterns declaring which
/// attributes are unknown rather than absent.
pub struct PartialActivation<B> {
    base: B,
    patterns: Vec<AttributePattern>,
}

impl<B: Activation> PartialActivation<B> {
    /// Wrap `base` with the given unknown patterns.
    pub fn new(base: B, patterns: Vec<AttributePattern>) -> Self {
        Self { base, patterns }
    }
}

impl<B: Activation> Activation for PartialActivation<B> {
    fn resolve_name(&self, name: &str) -> Option<Value> {
        self.base.resolve_name(name)
    }

    fn parent(&self) -> Option<&dyn Activation> {
        self.base.parent()
    }

    fn unknown_attribute_patterns(&self) -> &[AttributePattern] {
        &self.patterns
    }
}
