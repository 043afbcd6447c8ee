//! Attribute patterns for partial evaluation.
//!
//! A pattern names a variable plus an optional qualifier path and marks
//! matching attributes as unknown. `AttributePattern::new("user")
//! .qual_string("token")` matches `user.token` and everything beneath
//! it, but not `user.name`.

use cel_value::Value;

use crate::attributes::Qualifier;

/// Matches one qualifier step of an attribute path.
#[derive(Debug, Clone, PartialEq)]
pub enum QualifierPattern {
    /// Matches any qualifier value.
    Wildcard,
    /// Matches a string field or key.
    String(String),
    /// Matches a signed integer index or key.
    Int(i64),
    /// Matches an unsigned integer index or key.
    Uint(u64),
    /// Matches a boolean key.
    Bool(bool),
}

impl QualifierPattern {
    /// Whether this pattern matches the given qualifier.
    ///
    /// Value comparison is exact-kind: an int pattern never matches a
    /// uint qualifier and vice versa, matching how qualifier equality
    /// behaves everywhere else in the engine.
    pub fn matches(&self, qualifier: &Qualifier) -> bool {
        match self {
            QualifierPattern::Wildcard => true,
            QualifierPattern::String(s) => qualifier.value_equals(&Value::string(s.as_str())),
            QualifierPattern::Int(i) => qualifier.value_equals(&Value::Int(*i)),
            QualifierPattern::Uint(u) => qualifier.value_equals(&Value::UInt(*u)),
            QualifierPattern::Bool(b) => qualifier.value_equals(&Value::Bool(*b)),
        }
    }
}

/// Declares a variable, or a path beneath it, as unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePattern {
    variable: String,
    qualifiers: Vec<QualifierPattern>,
}

impl AttributePattern {
    /// A pattern matching the whole variable.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            qualifiers: Vec::new(),
        }
    }

    /// Append a string qualifier step.
    pub fn qual_string(mut self, value: impl Into<String>) -> Self {
        self.qualifiers.push(QualifierPattern::String(value.into()));
        self
    }

    /// Append a signed integer qualifier step.
    pub fn qual_int(mut self, value: i64) -> Self {
        self.qualifiers.push(QualifierPattern::Int(value));
        self
    }

    /// Append an unsigned integer qualifier step.
    pub fn qual_uint(mut self, value: u64) -> Self {
        self.qualifiers.push(QualifierPattern::Uint(value));
        self
    }

    /// Append a boolean qualifier step.
    pub fn qual_bool(mut self, value: bool) -> Self {
        self.qualifiers.push(QualifierPattern::Bool(value));
        self
    }

    /// Append a wildcard qualifier step.
    pub fn wildcard(mut self) -> Self {
        self.qualifiers.push(QualifierPattern::Wildcard);
        self
    }

    /// The variable name this pattern applies to.
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// The qualifier steps of this pattern.
    pub fn qualifier_patterns(&self) -> &[QualifierPattern] {
        &self.qualifiers
    }

    /// Whether this pattern applies to the given fully qualified
    /// variable name.
    pub fn variable_matches(&self, name: &str) -> bool {
        self.variable == name
    }

    /// Match this pattern against an attribute's qualifier path.
    ///
    /// Returns the number of pattern steps consumed when every step
    /// matches its positional qualifier and the attribute path is at
    /// least as long as the pattern. A longer attribute path still
    /// matches: unknownness of a prefix covers everything beneath it.
    pub fn match_prefix(&self, qualifiers: &[Qualifier]) -> Option<usize> {
        if self.qualifiers.len() > qualifiers.len() {
            return None;
        }
        for (pattern, qualifier) in self.qualifiers.iter().zip(qualifiers) {
            if !pattern.matches(qualifier) {
                return None;
            }
        }
        Some(self.qualifiers.len())
    }
}
