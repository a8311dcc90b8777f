// Transform interpreter: evaluates compiled specs and writes results along output paths

use std::mem;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::helpers::{HelperHost, HelperRegistry};
use super::output_path::OutputSegment;
use super::spec::{CompiledExpr, Shape, ShapeEntry, TransformSpec};
use super::TransformError;
use crate::domain::expression::{evaluate, Scope};
use crate::domain::url_context::UrlContext;
use crate::domain::variables::VariableScope;

type Result<T> = std::result::Result<T, TransformError>;

/// One transformation pass. Holds the variable scope shared by every nested
/// evaluation in the pass.
pub struct TransformEngine<'e> {
    helpers: &'e HelperRegistry,
    url: &'e UrlContext,
    variables: &'e mut VariableScope,
}

impl<'e> TransformEngine<'e> {
    pub fn new(helpers: &'e HelperRegistry, url: &'e UrlContext, variables: &'e mut VariableScope) -> Self {
        Self {
            helpers,
            url,
            variables,
        }
    }

    /// Apply `spec` to `input`; `None` is an absent result
    pub fn run(&mut self, spec: &TransformSpec, input: &Value) -> Result<Option<Value>> {
        match spec {
            TransformSpec::Literal(value) => Ok(Some(value.clone())),
            TransformSpec::Expr(expr) => self.evaluate(expr, input),
            TransformSpec::Call { expression, .. } => self.evaluate(expression, input),
            TransformSpec::List(items) => {
                let values = items
                    .iter()
                    .map(|item| Ok(self.run(item, input)?.unwrap_or(Value::Null)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Value::Array(values)))
            }
            TransformSpec::Shape(shape) => self.shape(shape, input).map(Some),
        }
    }

    fn evaluate(&self, expr: &CompiledExpr, input: &Value) -> Result<Option<Value>> {
        let host = HelperHost::new(self.helpers, self.url);
        let scope = Scope::new(input, &host).with_variables(&*self.variables);
        evaluate(&expr.ast, &scope).map_err(|source| TransformError::Expression {
            expression: expr.source.clone(),
            source,
        })
    }

    fn shape(&mut self, shape: &Shape, input: &Value) -> Result<Value> {
        let mut output = match &shape.base {
            Some(base) => self.run(base, input)?.unwrap_or_else(|| Value::Object(Map::new())),
            None => Value::Object(Map::new()),
        };

        for entry in &shape.entries {
            match entry {
                ShapeEntry::Bind { name, spec } => {
                    let value = self.run(spec, input)?;
                    debug!(variable = %name, present = value.is_some(), "binding transform variable");
                    match value {
                        Some(value) => self.variables.set(name, value),
                        None => {
                            self.variables.remove(name);
                        }
                    }
                }
                ShapeEntry::Write { path, spec } => self.place(&path.segments, spec, input, &mut output)?,
            }
        }
        Ok(output)
    }

    /// Walk `segments` inside `target`, creating containers as needed, and write the
    /// result of `spec` at the end. Loop segments fan out over the container they reach.
    fn place(
        &mut self,
        segments: &[OutputSegment],
        spec: &TransformSpec,
        input: &Value,
        target: &mut Value,
    ) -> Result<()> {
        let mut target = target;
        let mut rest = segments;

        while let Some((segment, tail)) = rest.split_first() {
            match segment {
                OutputSegment::EachItem(name) => return self.each_item(name, tail, spec, input, target),
                OutputSegment::EachEntry(name) => return self.each_entry(name, tail, spec, input, target),
                leaf if tail.is_empty() => {
                    let value = self.run(spec, input)?;
                    assign(target, leaf, value);
                    return Ok(());
                }
                step => match child_mut(target, step) {
                    Some(child) => {
                        target = child;
                        rest = tail;
                    }
                    None => {
                        warn!(segment = ?step, "cannot descend into a scalar value; write ignored");
                        return Ok(());
                    }
                },
            }
        }
        Ok(())
    }

    /// `[name]`: one pass per item; absent results drop the item
    fn each_item(
        &mut self,
        name: &str,
        tail: &[OutputSegment],
        spec: &TransformSpec,
        input: &Value,
        target: &mut Value,
    ) -> Result<()> {
        let items: Vec<Value> = match target {
            Value::Array(items) => mem::take(items),
            Value::Object(map) => mem::take(map)
                .into_iter()
                .map(|(key, value)| match value {
                    Value::Object(mut fields) => {
                        fields.insert("$key".to_string(), Value::String(key));
                        Value::Object(fields)
                    }
                    other => other,
                })
                .collect(),
            _ => {
                warn!(loop_name = %name, "list loop over a scalar value ignored");
                return Ok(());
            }
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, mut item) in items.into_iter().enumerate() {
            let binding = json!({ "value": item, "index": index });
            let iteration = iteration_input(input, &item, None, name, binding);
            if tail.is_empty() {
                match self.run(spec, &iteration)? {
                    Some(value) => results.push(value),
                    None => debug!(loop_name = %name, index, "dropping absent loop result"),
                }
            } else {
                self.place(tail, spec, &iteration, &mut item)?;
                results.push(item);
            }
        }

        *target = Value::Array(results);
        Ok(())
    }

    /// `{name}`: one pass per map entry; absent results drop the key
    fn each_entry(
        &mut self,
        name: &str,
        tail: &[OutputSegment],
        spec: &TransformSpec,
        input: &Value,
        target: &mut Value,
    ) -> Result<()> {
        let Value::Object(map) = target else {
            warn!(loop_name = %name, "map loop over a non-map value ignored");
            return Ok(());
        };

        let mut results = Map::new();
        for (key, mut value) in mem::take(map) {
            let binding = json!({ "key": key, "value": value });
            let iteration = iteration_input(input, &value, Some(&key), name, binding);
            if tail.is_empty() {
                if let Some(result) = self.run(spec, &iteration)? {
                    results.insert(key, result);
                }
            } else {
                self.place(tail, spec, &iteration, &mut value)?;
                results.insert(key, value);
            }
        }

        *map = results;
        Ok(())
    }
}

/// Input for one loop pass: the outer input's fields, the item's fields, `outer`,
/// `$key` for map loops, and the loop variable itself
fn iteration_input(input: &Value, item: &Value, key: Option<&str>, name: &str, binding: Value) -> Value {
    let mut fields = Map::new();
    if let Value::Object(props) = input {
        fields.extend(props.clone());
    }
    if let Value::Object(props) = item {
        fields.extend(props.clone());
    }
    if let Some(key) = key {
        fields.insert("$key".to_string(), Value::String(key.to_string()));
    }
    let outer = input.get("outer").unwrap_or(input).clone();
    fields.insert("outer".to_string(), outer);
    fields.insert(name.to_string(), binding);
    Value::Object(fields)
}

/// Numeric field names address list slots
fn list_index(segment: &OutputSegment) -> Option<usize> {
    match segment {
        OutputSegment::Index(index) => Some(*index),
        OutputSegment::Field(name) => name.parse().ok(),
        _ => None,
    }
}

fn map_key(segment: &OutputSegment) -> String {
    match segment {
        OutputSegment::Field(name) => name.clone(),
        OutputSegment::Index(index) => index.to_string(),
        OutputSegment::EachItem(name) | OutputSegment::EachEntry(name) => name.clone(),
    }
}

fn list_slot(items: &mut Vec<Value>, index: usize) -> &mut Value {
    if index >= items.len() {
        items.resize(index + 1, Value::Null);
    }
    &mut items[index]
}

/// Container to continue the walk in; missing or null children become empty maps
fn child_mut<'t>(target: &'t mut Value, segment: &OutputSegment) -> Option<&'t mut Value> {
    let slot = match target {
        Value::Object(map) => map.entry(map_key(segment)).or_insert(Value::Null),
        Value::Array(items) => list_slot(items, list_index(segment)?),
        _ => return None,
    };
    if slot.is_null() {
        *slot = Value::Object(Map::new());
    }
    Some(slot)
}

/// Leaf write; an absent value removes the key or list slot
fn assign(target: &mut Value, segment: &OutputSegment, value: Option<Value>) {
    match target {
        Value::Object(map) => {
            let key = map_key(segment);
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None if map.contains_key(&key) => {
                    // rebuild rather than remove so the remaining keys keep their order
                    *map = mem::take(map).into_iter().filter(|(k, _)| *k != key).collect();
                }
                None => {}
            }
        }
        Value::Array(items) => match (list_index(segment), value) {
            (Some(index), Some(value)) => *list_slot(items, index) = value,
            (Some(index), None) if index < items.len() => {
                items.remove(index);
            }
            (Some(_), None) => {}
            (None, _) => warn!(segment = ?segment, "non-numeric write into a list ignored"),
        },
        _ => warn!(segment = ?segment, "write into a scalar value ignored"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_absent_removes_key_in_order() {
        let mut target = json!({ "a": 1, "b": 2, "c": 3 });
        assign(&mut target, &OutputSegment::Field("a".into()), None);
        let keys: Vec<&String> = target.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_assign_into_list() {
        let mut target = json!([3, 2, 1]);
        assign(&mut target, &OutputSegment::Field("1".into()), Some(json!(9)));
        assert_eq!(target, json!([3, 9, 1]));
        assign(&mut target, &OutputSegment::Index(0), None);
        assert_eq!(target, json!([9, 1]));
    }

    #[test]
    fn test_child_mut_creates_maps() {
        let mut target = json!({ "a": null });
        let child = child_mut(&mut target, &OutputSegment::Field("a".into())).unwrap();
        assert_eq!(child, &json!({}));
        assert!(child_mut(&mut json!("text"), &OutputSegment::Field("a".into())).is_none());
    }

    #[test]
    fn test_iteration_input_keeps_outermost() {
        let input = json!({ "a": 1, "outer": { "root": true } });
        let item = json!({ "b": 2 });
        let iteration = iteration_input(&input, &item, Some("k"), "it", json!({}));
        assert_eq!(iteration["outer"], json!({ "root": true }));
        assert_eq!(iteration["a"], json!(1));
        assert_eq!(iteration["b"], json!(2));
        assert_eq!(iteration["$key"], json!("k"));
    }
}
