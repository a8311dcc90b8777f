// Scoped variable store threaded through one transformation call tree

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

const DEFAULT_SCOPE: &str = "";

/// Named values grouped by scope name. Reads fall back from the current scope
/// to the default (unnamed) scope.
///
/// One store is created per request and passed by `&mut` through every
/// recursive transform call, so a variable bound earlier in document order is
/// visible to everything evaluated later in the same pass.
#[derive(Debug, Clone)]
pub struct VariableScope {
    scopes: HashMap<String, IndexMap<String, Value>>,
    current: String,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::with_defaults(IndexMap::new())
    }

    pub fn with_defaults(initial: IndexMap<String, Value>) -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(DEFAULT_SCOPE.to_string(), initial);
        Self {
            scopes,
            current: DEFAULT_SCOPE.to_string(),
        }
    }

    /// Make `scope_name` current, creating it if needed
    pub fn set_scope(&mut self, scope_name: &str) {
        self.scopes.entry(scope_name.to_string()).or_default();
        self.current = scope_name.to_string();
    }

    pub fn scope_name(&self) -> &str {
        &self.current
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.get_for_scope(&self.current, name)
    }

    pub fn get_for_scope(&self, scope_name: &str, name: &str) -> Option<&Value> {
        self.scopes
            .get(scope_name)
            .and_then(|scope| scope.get(name))
            .or_else(|| self.scopes.get(DEFAULT_SCOPE).and_then(|scope| scope.get(name)))
    }

    pub fn set(&mut self, name: &str, value: Value) {
        let current = self.current.clone();
        self.set_for_scope(&current, name, value);
    }

    pub fn set_for_scope(&mut self, scope_name: &str, name: &str, value: Value) {
        self.scopes
            .entry(scope_name.to_string())
            .or_default()
            .insert(name.to_string(), value);
    }

    /// Remove a binding from the current scope
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.scopes
            .get_mut(&self.current)
            .and_then(|scope| scope.shift_remove(name))
    }

    /// Default-scope bindings overlaid with the current scope's
    pub fn variables(&self) -> IndexMap<String, Value> {
        self.variables_for_scope(&self.current)
    }

    pub fn variables_for_scope(&self, scope_name: &str) -> IndexMap<String, Value> {
        let mut merged = self.scopes.get(DEFAULT_SCOPE).cloned().unwrap_or_default();
        if scope_name != DEFAULT_SCOPE {
            if let Some(scope) = self.scopes.get(scope_name) {
                merged.extend(scope.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        merged
    }
}

impl Default for VariableScope {
    fn default() -> Self {
        Self::new()
    }
}
