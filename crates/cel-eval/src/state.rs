//! Per-node evaluation state.

use std::collections::HashMap;
use std::sync::Mutex;

use cel_value::Value;

use crate::ast::ExprId;

/// Records the value produced by each observed expression node.
///
/// State is shared between the planned tree and callers through an
/// `Arc`, so the table sits behind a mutex to keep the tree `Send +
/// Sync`. Observed evaluations are single-writer: one evaluation fills
/// the state, then the caller reads it (typically to prune), then
/// resets before the next observed run.
#[derive(Debug, Default)]
pub struct EvalState {
    entries: Mutex<HashMap<ExprId, Value>>,
}

impl EvalState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded value for an expression id, if any.
    pub fn value(&self, id: ExprId) -> Option<Value> {
        self.entries.lock().ok()?.get(&id).cloned()
    }

    /// Record the value for an expression id, replacing any prior entry.
    pub fn set_value(&self, id: ExprId, value: Value) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id, value);
        }
    }

    /// The ids with recorded values, in unspecified order.
    pub fn ids(&self) -> Vec<ExprId> {
        match self.entries.lock() {
            Ok(entries) => entries.keys().copied().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Clear all recorded values.
    pub fn reset(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_reset() {
        let state = EvalState::new();
        assert_eq!(state.value(1), None);

        state.set_value(1, Value::Int(42));
        assert_eq!(state.value(1), Some(Value::Int(42)));
        assert_eq!(state.ids(), vec![1]);

        state.set_value(1, Value::Int(7));
        assert_eq!(state.value(1), Some(Value::Int(7)));

        state.reset();
        assert_eq!(state.value(1), None);
        assert!(state.ids().is_empty());
    }
}
