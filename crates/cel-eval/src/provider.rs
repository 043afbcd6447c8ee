//! Type providers and adapters.
//!
//! The provider answers plan-time questions about declared types: enum
//! and type identifiers, struct construction and field accessors. The
//! adapter normalizes foreign values into CEL values at attribute
//! resolution boundaries.

use std::collections::HashMap;
use std::sync::Arc;

use cel_value::{EvalError, MapKey, TypeValue, Value, ValueMap};

/// Converts native or foreign values to CEL values.
pub type TypeAdapter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// The identity adapter, for inputs that are already CEL values.
pub fn default_adapter() -> TypeAdapter {
    Arc::new(|value| value)
}

/// Accessor pair for a declared struct field.
#[derive(Clone)]
pub struct FieldType {
    /// Presence test used by `has()`.
    pub is_set: Arc<dyn Fn(&Value) -> bool + Send + Sync>,
    /// Field accessor.
    pub get_field: Arc<dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync>,
}

/// Resolves type names, enum idents and struct fields at plan time.
pub trait TypeProvider: Send + Sync {
    /// Resolve an identifier to a type or enum value, such as
    /// `my.pkg.Kind.FOO`.
    fn find_ident(&self, name: &str) -> Option<Value>;

    /// Resolve a type name declared with this provider.
    fn find_type(&self, name: &str) -> Option<TypeValue>;

    /// Field accessor for a declared struct type.
    fn find_field_type(&self, type_name: &str, field: &str) -> Option<FieldType>;

    /// Construct a value of the named type from field initializers.
    fn new_value(&self, type_name: &str, fields: Vec<(String, Value)>)
        -> Result<Value, EvalError>;
}

/// A map-backed provider.
///
/// Struct types are modeled as maps with a declared field set. Suits
/// tests and embeddings without a schema compiler.
#[derive(Default)]
pub struct TypeRegistry {
    idents: HashMap<String, Value>,
    types: HashMap<String, Vec<String>>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enum or constant identifier.
    pub fn register_ident(&mut self, name: impl Into<String>, value: Value) {
        self.idents.insert(name.into(), value);
    }

    /// Register a struct type and its field names.
    pub fn register_type(&mut self, name: impl Into<String>, fields: Vec<String>) {
        let name = name.into();
        self.idents
            .insert(name.clone(), Value::Type(TypeValue::new(name.as_str())));
        self.types.insert(name, fields);
    }
}

impl TypeProvider for TypeRegistry {
    fn find_ident(&self, name: &str) -> Option<Value> {
        self.idents.get(name).cloned()
    }

    fn find_type(&self, name: &str) -> Option<TypeValue> {
        if self.types.contains_key(name) {
            Some(TypeValue::new(name))
        } else {
            None
        }
    }

    fn find_field_type(&self, type_name: &str, field: &str) -> Option<FieldType> {
        let fields = self.types.get(type_name)?;
        if !fields.iter().any(|f| f == field) {
            return None;
        }
        let key = MapKey::String(Arc::from(field));
        let get_key = key.clone();
        let field_name = field.to_string();
        Some(FieldType {
            is_set: Arc::new(move |obj| match obj {
                Value::Map(map) => map.contains_key(&key),
                _ => false,
            }),
            get_field: Arc::new(move |obj| match obj {
                Value::Map(map) => match map.get(&get_key) {
                    Some(value) => Ok(value.clone()),
                    None => Err(EvalError::no_such_key(&field_name)),
                },
                other => Err(EvalError::type_mismatch("map", other.type_name())),
            }),
        })
    }

    fn new_value(
        &self,
        type_name: &str,
        fields: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        let declared = self
            .types
            .get(type_name)
            .ok_or_else(|| EvalError::invalid_argument(format!("unknown type: {}", type_name)))?;
        let mut map = ValueMap::new();
        for (field, value) in fields {
            if !declared.iter().any(|f| f == &field) {
                return Err(EvalError::invalid_argument(format!(
                    "no such field: {}.{}",
                    type_name, field
                )));
            }
            map.insert(MapKey::String(Arc::from(field.as_str())), value);
        }
        Ok(Value::map(map))
    }
}
