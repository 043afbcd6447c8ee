//! Attribute resolution.
//!
//! An attribute is a variable plus a qualifier path, such as `a.b[2].c`.
//! The planner emits attributes instead of eager lookups so that
//! namespace resolution, map/list traversal and unknown-pattern matching
//! all happen against the activation supplied at evaluation time.
//!
//! The four shapes:
//!
//! - `Absolute`: one or more fully qualified candidate names, tried in
//!   order, then the qualifier path applied to the resolved value
//! - `Maybe`: an unchecked `a.b` that is either variable `a.b` or field
//!   `b` of variable `a`, kept as parallel absolute candidates
//! - `Conditional`: the result of planning a ternary whose branches are
//!   both attributes
//! - `Relative`: a qualifier path applied to a computed operand

use std::fmt;
use std::sync::Arc;

use cel_value::{EvalError, MapKey, Unknown, Value};

use crate::activation::Activation;
use crate::container::Container;
use crate::cost::{estimate_cost, Cost};
use crate::error::PlanError;
use crate::interpretable::Interpretable;
use crate::operators;
use crate::provider::{FieldType, TypeAdapter, TypeProvider};

// ==================== Attribute ====================

/// A variable with a qualifier path, resolved against an activation.
#[derive(Clone)]
pub enum Attribute {
    /// A fully qualified attribute.
    Absolute(AbsoluteAttribute),
    /// A ternary whose branches are attributes.
    Conditional(ConditionalAttribute),
    /// An unchecked dotted name with several possible splits.
    Maybe(MaybeAttribute),
    /// A qualifier path over a computed operand.
    Relative(RelativeAttribute),
}

impl Attribute {
    /// The id of the expression this attribute was planned from.
    pub fn id(&self) -> i64 {
        match self {
            Attribute::Absolute(a) => a.id,
            Attribute::Conditional(a) => a.id,
            Attribute::Maybe(a) => a.id,
            Attribute::Relative(a) => a.id,
        }
    }

    /// Append a qualifier step to the attribute path.
    pub fn add_qualifier(&mut self, qualifier: Qualifier) {
        match self {
            Attribute::Absolute(a) => a.qualifiers.push(qualifier),
            Attribute::Conditional(a) => {
                a.truthy.add_qualifier(qualifier.clone());
                a.falsy.add_qualifier(qualifier);
            }
            Attribute::Maybe(a) => a.add_qualifier(qualifier),
            Attribute::Relative(a) => a.qualifiers.push(qualifier),
        }
    }

    /// Resolve the attribute, distinguishing "not found" from failure.
    pub fn try_resolve(&self, vars: &dyn Activation) -> Result<Option<Value>, EvalError> {
        match self {
            Attribute::Absolute(a) => a.try_resolve(vars),
            Attribute::Conditional(a) => a.try_resolve(vars),
            Attribute::Maybe(a) => a.try_resolve(vars),
            Attribute::Relative(a) => a.try_resolve(vars),
        }
    }

    /// Resolve the attribute, turning "not found" into an error.
    pub fn resolve(&self, vars: &dyn Activation) -> Result<Value, EvalError> {
        match self.try_resolve(vars)? {
            Some(value) => Ok(value),
            None => Err(EvalError::no_such_attribute(&self.to_string())),
        }
    }

    /// Estimated resolution cost.
    pub fn cost(&self) -> Cost {
        match self {
            Attribute::Absolute(a) => {
                Cost::of(1 + a.qualifiers.len() as u64) + qualifiers_cost(&a.qualifiers)
            }
            Attribute::Maybe(a) => {
                let quals = a
                    .attrs
                    .first()
                    .map(|attr| attr.qualifiers.len() as u64)
                    .unwrap_or(0);
                Cost::of(1 + quals)
            }
            Attribute::Conditional(a) => {
                let truthy = a.truthy.cost();
                let falsy = a.falsy.cost();
                estimate_cost(&a.expr)
                    + Cost {
                        min: truthy.min.min(falsy.min),
                        max: truthy.max.max(falsy.max),
                    }
            }
            Attribute::Relative(a) => {
                estimate_cost(&a.operand)
                    + Cost::of(a.qualifiers.len() as u64)
                    + qualifiers_cost(&a.qualifiers)
            }
        }
    }
}

fn qualifiers_cost(qualifiers: &[Qualifier]) -> Cost {
    let mut cost = Cost::default();
    for q in qualifiers {
        if let Qualifier::Attribute { attribute, .. } = q {
            cost = cost + attribute.cost();
        }
    }
    cost
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Absolute(a) => {
                write!(f, "{}", a.names.first().map(String::as_str).unwrap_or(""))?;
                write_qualifiers(f, &a.qualifiers)
            }
            Attribute::Maybe(a) => match a.attrs.first() {
                Some(first) => {
                    write!(f, "{}", first.names.last().map(String::as_str).unwrap_or(""))?;
                    write_qualifiers(f, &first.qualifiers)
                }
                None => Ok(()),
            },
            Attribute::Conditional(a) => write!(f, "{} ? {} : {}", "<cond>", a.truthy, a.falsy),
            Attribute::Relative(a) => {
                write!(f, "<operand>")?;
                write_qualifiers(f, &a.qualifiers)
            }
        }
    }
}

fn write_qualifiers(f: &mut fmt::Formatter<'_>, qualifiers: &[Qualifier]) -> fmt::Result {
    for q in qualifiers {
        match q {
            Qualifier::String { value, .. } => write!(f, ".{}", value)?,
            Qualifier::Int { value, .. } => write!(f, "[{}]", value)?,
            Qualifier::Uint { value, .. } => write!(f, "[{}u]", value)?,
            Qualifier::Bool { value, .. } => write!(f, "[{}]", value)?,
            Qualifier::Field { name, .. } => write!(f, ".{}", name)?,
            Qualifier::Attribute { attribute, .. } => write!(f, "[{}]", attribute)?,
        }
    }
    Ok(())
}

// ==================== AbsoluteAttribute ====================

/// An attribute with fully qualified candidate names.
#[derive(Clone)]
pub struct AbsoluteAttribute {
    id: i64,
    names: Vec<String>,
    qualifiers: Vec<Qualifier>,
    provider: Arc<dyn TypeProvider>,
    match_unknowns: bool,
}

impl AbsoluteAttribute {
    fn try_resolve(&self, vars: &dyn Activation) -> Result<Option<Value>, EvalError> {
        for name in &self.names {
            if self.match_unknowns {
                if let Some(unknown) = self.match_unknown_patterns(vars, name) {
                    return Ok(Some(unknown));
                }
            }
            if let Some(obj) = vars.resolve_name(name) {
                return apply_qualifiers(obj, &self.qualifiers, vars).map(Some);
            }
            if let Some(type_value) = self.provider.find_ident(name) {
                if self.qualifiers.is_empty() {
                    return Ok(Some(type_value));
                }
                return Err(EvalError::no_such_attribute(name));
            }
        }
        Ok(None)
    }

    /// Check the activation's unknown patterns against this attribute.
    ///
    /// When a pattern matches, the unknown carries the id of the last
    /// pattern-consumed qualifier, or the attribute id for a
    /// variable-only pattern.
    fn match_unknown_patterns(&self, vars: &dyn Activation, name: &str) -> Option<Value> {
        for pattern in vars.unknown_attribute_patterns() {
            if !pattern.variable_matches(name) {
                continue;
            }
            if let Some(consumed) = pattern.match_prefix(&self.qualifiers) {
                let id = if consumed == 0 {
                    self.id
                } else {
                    self.qualifiers[consumed - 1].id()
                };
                return Some(Value::Unknown(Unknown::new(id)));
            }
        }
        None
    }
}

// ==================== ConditionalAttribute ====================

/// The planned form of `cond ? a.b : c.d`.
#[derive(Clone)]
pub struct ConditionalAttribute {
    id: i64,
    expr: Box<Interpretable>,
    truthy: Box<Attribute>,
    falsy: Box<Attribute>,
}

impl ConditionalAttribute {
    /// The condition expression.
    pub fn expr(&self) -> &Interpretable {
        &self.expr
    }

    /// The attribute resolved when the condition is true.
    pub fn truthy(&self) -> &Attribute {
        &self.truthy
    }

    /// The attribute resolved when the condition is false.
    pub fn falsy(&self) -> &Attribute {
        &self.falsy
    }

    fn try_resolve(&self, vars: &dyn Activation) -> Result<Option<Value>, EvalError> {
        match self.expr.eval(vars) {
            Value::Bool(true) => self.truthy.try_resolve(vars),
            Value::Bool(false) => self.falsy.try_resolve(vars),
            unknown @ Value::Unknown(_) => Ok(Some(unknown)),
            Value::Error(e) => Err((*e).clone()),
            _ => Err(EvalError::no_matching_overload(operators::CONDITIONAL)),
        }
    }
}

// ==================== MaybeAttribute ====================

/// An unchecked dotted name kept as parallel interpretations.
///
/// For `a.b` in the root container the candidates are variable `a.b`
/// and field `b` of variable `a`, tried in that order. Adding a constant
/// string qualifier `.c` grows the candidate list: the new variable
/// interpretation `a.b.c` is inserted at the front and the qualifier is
/// appended to every existing candidate.
#[derive(Clone)]
pub struct MaybeAttribute {
    id: i64,
    attrs: Vec<AbsoluteAttribute>,
}

impl MaybeAttribute {
    fn add_qualifier(&mut self, qualifier: Qualifier) {
        if let Some(field) = qualifier.const_string() {
            let longer_names: Vec<String> = self
                .attrs
                .iter()
                .filter(|attr| attr.qualifiers.is_empty())
                .flat_map(|attr| {
                    attr.names
                        .iter()
                        .map(|name| format!("{}.{}", name, field))
                        .collect::<Vec<_>>()
                })
                .collect();
            if !longer_names.is_empty() {
                let template = &self.attrs[0];
                let longer = AbsoluteAttribute {
                    id: qualifier.id(),
                    names: longer_names,
                    qualifiers: Vec::new(),
                    provider: template.provider.clone(),
                    match_unknowns: template.match_unknowns,
                };
                for attr in &mut self.attrs {
                    attr.qualifiers.push(qualifier.clone());
                }
                self.attrs.insert(0, longer);
                return;
            }
        }
        for attr in &mut self.attrs {
            attr.qualifiers.push(qualifier.clone());
        }
    }

    fn try_resolve(&self, vars: &dyn Activation) -> Result<Option<Value>, EvalError> {
        for attr in &self.attrs {
            if let Some(value) = attr.try_resolve(vars)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

// ==================== RelativeAttribute ====================

/// A qualifier path over a computed operand, such as `f(x).field`.
#[derive(Clone)]
pub struct RelativeAttribute {
    id: i64,
    operand: Box<Interpretable>,
    qualifiers: Vec<Qualifier>,
}

impl RelativeAttribute {
    fn try_resolve(&self, vars: &dyn Activation) -> Result<Option<Value>, EvalError> {
        match self.operand.eval(vars) {
            // An operand error reads as "nothing to resolve here".
            Value::Error(_) => Ok(None),
            unknown @ Value::Unknown(_) => Ok(Some(unknown)),
            obj => apply_qualifiers(obj, &self.qualifiers, vars).map(Some),
        }
    }
}

// ==================== Qualifier ====================

/// One step of an attribute path.
#[derive(Clone)]
pub enum Qualifier {
    /// A constant string field or key.
    String {
        /// Originating expression id.
        id: i64,
        /// The field or key name.
        value: String,
    },
    /// A constant signed integer index or key.
    Int {
        /// Originating expression id.
        id: i64,
        /// The index or key.
        value: i64,
    },
    /// A constant unsigned integer index or key.
    Uint {
        /// Originating expression id.
        id: i64,
        /// The index or key.
        value: u64,
    },
    /// A constant boolean key.
    Bool {
        /// Originating expression id.
        id: i64,
        /// The key.
        value: bool,
    },
    /// A field access with known type information.
    Field {
        /// Originating expression id.
        id: i64,
        /// The field name.
        name: String,
        /// Accessor and presence test for the field.
        field_type: FieldType,
    },
    /// A computed key, itself an attribute.
    Attribute {
        /// Originating expression id.
        id: i64,
        /// The attribute producing the key.
        attribute: Box<Attribute>,
    },
}

impl Qualifier {
    /// A constant string qualifier.
    pub fn string(id: i64, value: impl Into<String>) -> Qualifier {
        Qualifier::String {
            id,
            value: value.into(),
        }
    }

    /// A constant signed integer qualifier.
    pub fn int(id: i64, value: i64) -> Qualifier {
        Qualifier::Int { id, value }
    }

    /// A constant unsigned integer qualifier.
    pub fn uint(id: i64, value: u64) -> Qualifier {
        Qualifier::Uint { id, value }
    }

    /// A constant boolean qualifier.
    pub fn bool(id: i64, value: bool) -> Qualifier {
        Qualifier::Bool { id, value }
    }

    /// A typed field qualifier.
    pub fn field(id: i64, name: impl Into<String>, field_type: FieldType) -> Qualifier {
        Qualifier::Field {
            id,
            name: name.into(),
            field_type,
        }
    }

    /// A computed qualifier backed by an attribute.
    pub fn attribute(id: i64, attribute: Attribute) -> Qualifier {
        Qualifier::Attribute {
            id,
            attribute: Box::new(attribute),
        }
    }

    /// The originating expression id of this qualifier step.
    pub fn id(&self) -> i64 {
        match self {
            Qualifier::String { id, .. }
            | Qualifier::Int { id, .. }
            | Qualifier::Uint { id, .. }
            | Qualifier::Bool { id, .. }
            | Qualifier::Field { id, .. }
            | Qualifier::Attribute { id, .. } => *id,
        }
    }

    /// Whether the qualifier value is known at plan time.
    pub fn is_const(&self) -> bool {
        !matches!(self, Qualifier::Attribute { .. })
    }

    /// The qualifier's string value, for constant string and field
    /// qualifiers.
    pub fn const_string(&self) -> Option<&str> {
        match self {
            Qualifier::String { value, .. } => Some(value),
            Qualifier::Field { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Exact-kind equality between the qualifier's constant value and a
    /// candidate value. Int and uint never compare equal.
    pub fn value_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Qualifier::String { value, .. }, Value::String(s)) => value.as_str() == &**s,
            (Qualifier::Field { name, .. }, Value::String(s)) => name.as_str() == &**s,
            (Qualifier::Int { value, .. }, Value::Int(i)) => value == i,
            (Qualifier::Uint { value, .. }, Value::UInt(u)) => value == u,
            (Qualifier::Bool { value, .. }, Value::Bool(b)) => value == b,
            _ => false,
        }
    }

    /// Apply this qualifier step to a value.
    pub fn qualify(&self, obj: &Value, vars: &dyn Activation) -> Result<Value, EvalError> {
        match self {
            Qualifier::String { value, .. } => qualify_by_value(obj, &Value::string(value.as_str())),
            Qualifier::Int { value, .. } => qualify_by_value(obj, &Value::Int(*value)),
            Qualifier::Uint { value, .. } => qualify_by_value(obj, &Value::UInt(*value)),
            Qualifier::Bool { value, .. } => qualify_by_value(obj, &Value::Bool(*value)),
            Qualifier::Field {
                name, field_type, ..
            } => match obj {
                Value::Map(_) => qualify_by_value(obj, &Value::string(name.as_str())),
                _ => (field_type.get_field)(obj),
            },
            Qualifier::Attribute { attribute, .. } => {
                let key = attribute.resolve(vars)?;
                if key.is_unknown() {
                    return Ok(key);
                }
                qualify_by_value(obj, &key)
            }
        }
    }
}

/// Apply a constant key to a map or list.
fn qualify_by_value(obj: &Value, key: &Value) -> Result<Value, EvalError> {
    match obj {
        Value::Map(map) => {
            let map_key = MapKey::from_value(key)
                .ok_or_else(|| EvalError::type_mismatch("map key", key.type_name()))?;
            match map.get(&map_key) {
                Some(value) => Ok(value.clone()),
                None => Err(EvalError::no_such_key(&key.to_string())),
            }
        }
        Value::List(elems) => {
            let index = match key {
                Value::Int(i) => {
                    if *i < 0 {
                        return Err(EvalError::index_out_of_bounds(*i, elems.len()));
                    }
                    *i as usize
                }
                Value::UInt(u) => *u as usize,
                _ => {
                    return Err(EvalError::type_mismatch("int index", key.type_name()));
                }
            };
            match elems.get(index) {
                Some(value) => Ok(value.clone()),
                None => Err(EvalError::index_out_of_bounds(index as i64, elems.len())),
            }
        }
        Value::Unknown(_) => Ok(obj.clone()),
        Value::Error(e) => Err((**e).clone()),
        _ => Err(EvalError::type_mismatch("map or list", obj.type_name())),
    }
}

/// Apply a qualifier path to a resolved object.
fn apply_qualifiers(
    mut obj: Value,
    qualifiers: &[Qualifier],
    vars: &dyn Activation,
) -> Result<Value, EvalError> {
    for qualifier in qualifiers {
        match &obj {
            Value::Unknown(_) => return Ok(obj),
            Value::Error(e) => return Err((**e).clone()),
            _ => {}
        }
        obj = qualifier.qualify(&obj, vars)?;
    }
    Ok(obj)
}

// ==================== AttributeFactory ====================

/// Builds attributes during planning.
///
/// The factory carries the namespace container, the type provider used
/// for type-ident resolution, and whether attributes should consult
/// activation unknown patterns.
#[derive(Clone)]
pub struct AttributeFactory {
    container: Container,
    provider: Arc<dyn TypeProvider>,
    adapter: TypeAdapter,
    enable_unknowns: bool,
}

impl AttributeFactory {
    /// A factory for complete (non-partial) evaluation.
    pub fn new(container: Container, provider: Arc<dyn TypeProvider>, adapter: TypeAdapter) -> Self {
        Self {
            container,
            provider,
            adapter,
            enable_unknowns: false,
        }
    }

    /// Enable unknown-pattern matching on every built attribute.
    pub fn with_unknown_patterns(mut self) -> Self {
        self.enable_unknowns = true;
        self
    }

    /// The adapter this factory was created with.
    pub fn adapter(&self) -> &TypeAdapter {
        &self.adapter
    }

    /// An attribute with explicit fully qualified candidate names.
    pub fn absolute_attribute(&self, id: i64, names: Vec<String>) -> Attribute {
        Attribute::Absolute(AbsoluteAttribute {
            id,
            names,
            qualifiers: Vec::new(),
            provider: self.provider.clone(),
            match_unknowns: self.enable_unknowns,
        })
    }

    /// An attribute for an unchecked identifier, expanded through the
    /// container's candidate names.
    pub fn maybe_attribute(&self, id: i64, name: &str) -> Attribute {
        Attribute::Maybe(MaybeAttribute {
            id,
            attrs: vec![AbsoluteAttribute {
                id,
                names: self.container.resolve_candidate_names(name),
                qualifiers: Vec::new(),
                provider: self.provider.clone(),
                match_unknowns: self.enable_unknowns,
            }],
        })
    }

    /// An attribute for a ternary with attribute branches.
    pub fn conditional_attribute(
        &self,
        id: i64,
        expr: Interpretable,
        truthy: Attribute,
        falsy: Attribute,
    ) -> Attribute {
        Attribute::Conditional(ConditionalAttribute {
            id,
            expr: Box::new(expr),
            truthy: Box::new(truthy),
            falsy: Box::new(falsy),
        })
    }

    /// An attribute over a computed operand.
    pub fn relative_attribute(&self, id: i64, operand: Interpretable) -> Attribute {
        Attribute::Relative(RelativeAttribute {
            id,
            operand: Box::new(operand),
            qualifiers: Vec::new(),
        })
    }

    /// A qualifier for a plan-time constant value.
    pub fn new_qualifier(&self, id: i64, value: Value) -> Result<Qualifier, PlanError> {
        match value {
            Value::String(s) => Ok(Qualifier::string(id, s.to_string())),
            Value::Int(i) => Ok(Qualifier::int(id, i)),
            Value::UInt(u) => Ok(Qualifier::uint(id, u)),
            Value::Bool(b) => Ok(Qualifier::bool(id, b)),
            other => Err(PlanError::InvalidQualifier(other.type_name().to_string())),
        }
    }
}
