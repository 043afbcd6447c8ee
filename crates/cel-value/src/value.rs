//! Runtime value representation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::EvalError;

// ==================== Value ====================

/// A CEL runtime value.
///
/// Composite kinds are reference counted so cloning a value is cheap and
/// evaluation can hand out copies freely. `Error` and `Unknown` are value
/// kinds rather than control flow: operators inspect their operands and
/// propagate them explicitly.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// Unsigned 64-bit integer.
    UInt(u64),
    /// 64-bit float.
    Double(f64),
    /// String value.
    String(Arc<str>),
    /// Byte string.
    Bytes(Arc<[u8]>),
    /// List of values.
    List(Arc<[Value]>),
    /// Map from keys to values.
    Map(Arc<ValueMap>),
    /// A type, as a first-class value.
    Type(TypeValue),
    /// A set of expression ids whose values were not provided.
    Unknown(Unknown),
    /// An evaluation error.
    Error(Arc<EvalError>),
}

/// Capabilities a value kind supports, used to gate overload dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTrait {
    /// Supports addition / concatenation.
    Adder,
    /// Supports ordered comparison.
    Comparer,
    /// Supports membership tests.
    Container,
    /// Supports field presence tests.
    FieldTester,
    /// Supports indexing.
    Indexer,
    /// Supports iteration.
    Iterable,
    /// Supports arithmetic negation.
    Negater,
    /// Supports size().
    Sizer,
}

impl Value {
    // ==================== Constructors ====================

    /// Create a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// Create a bytes value.
    pub fn bytes(b: impl Into<Arc<[u8]>>) -> Self {
        Value::Bytes(b.into())
    }

    /// Create a list value.
    pub fn list(elems: impl Into<Arc<[Value]>>) -> Self {
        Value::List(elems.into())
    }

    /// Create a map value.
    pub fn map(map: ValueMap) -> Self {
        Value::Map(Arc::new(map))
    }

    /// Create an error value.
    pub fn error(err: EvalError) -> Self {
        Value::Error(Arc::new(err))
    }

    /// Create an unknown value for a single expression id.
    pub fn unknown(id: i64) -> Self {
        Value::Unknown(Unknown::new(id))
    }

    // ==================== Accessors ====================

    /// The CEL type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null_type",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Type(_) => "type",
            Value::Unknown(_) => "unknown",
            Value::Error(_) => "error",
        }
    }

    /// Returns the boolean if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an int value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the unsigned integer if this is a uint value.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    /// Returns the float if this is a double value.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements if this is a list value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(elems) => Some(elems),
            _ => None,
        }
    }

    /// Returns the map if this is a map value.
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True if this is an error value.
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// True if this is an unknown value.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// True if this is an error or unknown value.
    pub fn is_unknown_or_error(&self) -> bool {
        matches!(self, Value::Unknown(_) | Value::Error(_))
    }

    /// Whether this value kind supports the given capability.
    pub fn has_trait(&self, t: ValueTrait) -> bool {
        match self {
            Value::Bool(_) => matches!(t, ValueTrait::Comparer | ValueTrait::Negater),
            Value::Int(_) | Value::UInt(_) | Value::Double(_) => matches!(
                t,
                ValueTrait::Adder | ValueTrait::Comparer | ValueTrait::Negater
            ),
            Value::String(_) => matches!(
                t,
                ValueTrait::Adder | ValueTrait::Comparer | ValueTrait::Sizer
            ),
            Value::Bytes(_) => matches!(
                t,
                ValueTrait::Adder | ValueTrait::Comparer | ValueTrait::Sizer
            ),
            Value::List(_) => matches!(
                t,
                ValueTrait::Adder
                    | ValueTrait::Container
                    | ValueTrait::Indexer
                    | ValueTrait::Iterable
                    | ValueTrait::Sizer
            ),
            Value::Map(_) => matches!(
                t,
                ValueTrait::Container
                    | ValueTrait::FieldTester
                    | ValueTrait::Indexer
                    | ValueTrait::Iterable
                    | ValueTrait::Sizer
            ),
            Value::Null | Value::Type(_) | Value::Unknown(_) | Value::Error(_) => false,
        }
    }

    /// Numeric ordering across int, uint and double operands.
    ///
    /// Returns None for non-numeric or mixed incomparable operands.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::UInt(a), Value::UInt(b)) => Some(a.cmp(b)),
            (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::UInt(b)) => {
                if *a < 0 {
                    Some(Ordering::Less)
                } else {
                    Some((*a as u64).cmp(b))
                }
            }
            (Value::UInt(a), Value::Int(b)) => {
                if *b < 0 {
                    Some(Ordering::Greater)
                } else {
                    Some(a.cmp(&(*b as u64)))
                }
            }
            (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::UInt(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
            (Value::Double(a), Value::UInt(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Unknown(a), Value::Unknown(b)) => a == b,
            // Errors never compare equal, even to themselves.
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}u", u),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "b{:?}", b),
            Value::List(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Type(t) => write!(f, "{}", t.name()),
            Value::Unknown(u) => write!(f, "unknown{:?}", u.ids()),
            Value::Error(e) => write!(f, "error: {}", e),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::UInt(u)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s.as_str()))
    }
}

impl From<Vec<Value>> for Value {
    fn from(elems: Vec<Value>) -> Self {
        Value::List(Arc::from(elems))
    }
}

impl From<EvalError> for Value {
    fn from(err: EvalError) -> Self {
        Value::error(err)
    }
}

// ==================== Unknown ====================

/// The set of expression ids whose attribute values were declared unknown.
///
/// Unknowns accumulate: combining two unknowns during logical operators
/// merges their id sets so the caller learns every input that must be
/// supplied to make the result concrete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unknown {
    ids: Vec<i64>,
}

impl Unknown {
    /// Create an unknown for a single expression id.
    pub fn new(id: i64) -> Self {
        Self { ids: vec![id] }
    }

    /// The expression ids this unknown carries, in insertion order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// True if the unknown carries the given id.
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Merge another unknown's ids into this one, skipping duplicates.
    pub fn merge(&mut self, other: &Unknown) {
        for id in &other.ids {
            if !self.ids.contains(id) {
                self.ids.push(*id);
            }
        }
    }
}

// ==================== MapKey / ValueMap ====================

/// A map key. CEL map keys are restricted to bool, int, uint and string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    /// Boolean key.
    Bool(bool),
    /// Signed integer key.
    Int(i64),
    /// Unsigned integer key.
    UInt(u64),
    /// String key.
    String(Arc<str>),
}

impl MapKey {
    /// Convert a value into a map key, if the value is a valid key kind.
    pub fn from_value(value: &Value) -> Option<MapKey> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::UInt(u) => Some(MapKey::UInt(*u)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            _ => None,
        }
    }

    /// Convert this key back into a value.
    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::UInt(u) => Value::UInt(*u),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::UInt(u) => write!(f, "{}u", u),
            MapKey::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A CEL map. Backed by a BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMap {
    entries: BTreeMap<MapKey, Value>,
}

impl ValueMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair, replacing any existing entry.
    pub fn insert(&mut self, key: MapKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Look up a key.
    pub fn get(&self, key: &MapKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Whether the map contains the key.
    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.entries.iter()
    }

    /// Iterate keys in key order.
    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.keys()
    }
}

impl FromIterator<(MapKey, Value)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (MapKey, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ==================== TypeValue ====================

/// A CEL type as a first-class value, identified by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeValue {
    name: Arc<str>,
}

impl TypeValue {
    /// Create a type value with the given name.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// The type's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_type_equality_is_false() {
        assert_ne!(Value::Int(1), Value::UInt(1));
        assert_ne!(Value::Int(1), Value::Double(1.0));
        assert_ne!(Value::Bool(true), Value::Int(1));
    }

    #[test]
    fn test_errors_never_equal() {
        let e = Value::error(EvalError::no_such_key("x"));
        assert_ne!(e.clone(), e);
    }

    #[test]
    fn test_cross_numeric_compare() {
        use std::cmp::Ordering;
        assert_eq!(
            Value::Int(-1).compare(&Value::UInt(0)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::UInt(2).compare(&Value::Int(2)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            Value::Double(1.5).compare(&Value::Int(1)),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::String(Arc::from("a")).compare(&Value::Int(1)), None);
    }

    #[test]
    fn test_unknown_merge_dedups() {
        let mut u = Unknown::new(1);
        let mut other = Unknown::new(2);
        other.merge(&Unknown::new(1));
        u.merge(&other);
        assert_eq!(u.ids(), &[1, 2]);
    }

    #[test]
    fn test_map_key_round_trip() {
        let key = MapKey::from_value(&Value::from("name")).unwrap();
        assert_eq!(key.to_value(), Value::from("name"));
        assert!(MapKey::from_value(&Value::Double(1.0)).is_none());
    }

    #[test]
    fn test_value_traits() {
        assert!(Value::list(vec![]).has_trait(ValueTrait::Iterable));
        assert!(Value::map(ValueMap::new()).has_trait(ValueTrait::FieldTester));
        assert!(!Value::Int(1).has_trait(ValueTrait::Indexer));
        assert!(Value::from("x").has_trait(ValueTrait::Sizer));
    }

    #[test]
    fn test_display() {
        let mut map = ValueMap::new();
        map.insert(MapKey::String(Arc::from("a")), Value::Int(1));
        assert_eq!(Value::map(map).to_string(), "{\"a\": 1}");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::UInt(2)]).to_string(),
            "[1, 2u]"
        );
    }
}
