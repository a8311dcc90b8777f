// Structural query engine
//
// Reads into JSON values with `/`-separated paths, supporting quoted property
// names, numeric and `last()` indexing, boolean filters and `[]` enumeration.
// Results that fan out over several branches are flattened one level before
// the next property segment is applied.

mod path;

use serde_json::Value;
use thiserror::Error;

use super::expression::{
    evaluate, value::as_index, value::truthy, Expr, ExpressionError, ExpressionParser,
    FunctionHost, Scope,
};

pub use path::{QueryPathParser, QuerySegment, Selector};

/// Query errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid query path '{path}': {message}")]
    Syntax { path: String, message: String },

    #[error("Filter '{filter}' in query path '{path}' failed: {source}")]
    Filter {
        path: String,
        filter: String,
        source: ExpressionError,
    },
}

/// Result of a query plus whether the path enumerated with `[]`
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub value: Option<Value>,
    pub enumerated: bool,
}

/// Query `value` at `path`; `None` means the path led nowhere
pub fn query(value: &Value, path: &str) -> Result<Option<Value>, QueryError> {
    Ok(query_outcome(Some(value), path)?.value)
}

/// Query a possibly absent root.
///
/// An absent or null root with a non-empty path yields an empty list.
pub fn query_outcome(root: Option<&Value>, path: &str) -> Result<QueryOutcome, QueryError> {
    let segments = QueryPathParser::parse(path)?;
    let enumerated = segments
        .iter()
        .any(|segment| segment.selector.as_ref().is_some_and(Selector::enumerates));

    if segments.is_empty() {
        return Ok(QueryOutcome {
            value: root.cloned(),
            enumerated,
        });
    }

    let root = match root {
        None | Some(Value::Null) => {
            return Ok(QueryOutcome {
                value: Some(Value::Array(Vec::new())),
                enumerated,
            })
        }
        Some(root) => root,
    };

    let mut cursor = Cursor::One(root);
    for segment in &segments {
        let compiled = CompiledSegment::compile(segment, path)?;
        if segment.property.is_some() {
            cursor = cursor.flatten();
        }
        cursor = cursor.step(&compiled)?;
        if matches!(cursor, Cursor::Absent) {
            break;
        }
    }

    Ok(QueryOutcome {
        value: cursor.into_value(),
        enumerated,
    })
}

/// A position in the queried value: nothing, one borrowed value, or a fan-out of branches
#[derive(Debug)]
enum Cursor<'v> {
    Absent,
    One(&'v Value),
    Many(Vec<Cursor<'v>>),
}

impl<'v> Cursor<'v> {
    /// Splice nested branch lists and list values into a single level
    fn flatten(self) -> Self {
        match self {
            Cursor::Many(branches) => Cursor::Many(
                branches
                    .into_iter()
                    .flat_map(|branch| match branch {
                        Cursor::Many(inner) => inner,
                        Cursor::One(Value::Array(items)) => items.iter().map(Cursor::One).collect(),
                        other => vec![other],
                    })
                    .collect(),
            ),
            other => other,
        }
    }

    fn step(self, segment: &CompiledSegment<'_>) -> Result<Self, QueryError> {
        match self {
            Cursor::Absent => Ok(Cursor::Absent),
            Cursor::Many(branches) => {
                let mut stepped = Vec::with_capacity(branches.len());
                for branch in branches {
                    match branch.step(segment)? {
                        Cursor::Absent => {}
                        cursor => stepped.push(cursor),
                    }
                }
                Ok(Cursor::Many(stepped))
            }
            Cursor::One(Value::Array(items)) if segment.property.is_some() => {
                Cursor::Many(items.iter().map(Cursor::One).collect()).step(segment)
            }
            Cursor::One(value) => segment.apply(value),
        }
    }

    fn into_value(self) -> Option<Value> {
        match self {
            Cursor::Absent => None,
            Cursor::One(value) => Some(value.clone()),
            Cursor::Many(branches) => Some(Value::Array(
                branches.into_iter().filter_map(Cursor::into_value).collect(),
            )),
        }
    }
}

enum CompiledSelector {
    All,
    Expr { source: String, ast: Expr },
}

struct CompiledSegment<'s> {
    path: &'s str,
    property: Option<&'s str>,
    selector: Option<CompiledSelector>,
}

impl<'s> CompiledSegment<'s> {
    fn compile(segment: &'s QuerySegment, path: &'s str) -> Result<Self, QueryError> {
        let selector = match &segment.selector {
            None => None,
            Some(Selector::All) => Some(CompiledSelector::All),
            Some(Selector::Expr(source)) => {
                let ast = ExpressionParser::parse(source).map_err(|e| QueryError::Filter {
                    path: path.to_string(),
                    filter: source.clone(),
                    source: e,
                })?;
                Some(CompiledSelector::Expr {
                    source: source.clone(),
                    ast,
                })
            }
        };
        Ok(Self {
            path,
            property: segment.property.as_deref(),
            selector,
        })
    }

    fn apply<'v>(&self, value: &'v Value) -> Result<Cursor<'v>, QueryError> {
        let base = match self.property {
            Some(name) => match value {
                Value::Object(map) => map.get(name),
                _ => None,
            },
            None => Some(value),
        };

        match (&self.selector, base) {
            (None, Some(found)) => Ok(Cursor::One(found)),
            (None, None) => Ok(Cursor::Absent),
            (Some(CompiledSelector::All), Some(Value::Array(items))) => {
                Ok(Cursor::Many(items.iter().map(Cursor::One).collect()))
            }
            (Some(CompiledSelector::All), _) => Ok(Cursor::Many(Vec::new())),
            (Some(CompiledSelector::Expr { source, ast }), Some(Value::Array(items))) => {
                self.select(source, ast, items)
            }
            (Some(CompiledSelector::Expr { .. }), _) => Ok(Cursor::Absent),
        }
    }

    /// Index when the selector evaluates to a number, filter otherwise
    fn select<'v>(&self, source: &str, ast: &Expr, items: &'v [Value]) -> Result<Cursor<'v>, QueryError> {
        if items.is_empty() {
            return Ok(Cursor::Many(Vec::new()));
        }

        let host = LastIndex(items.len() - 1);
        let probe = Value::Null;
        if let Ok(Some(index @ Value::Number(_))) = evaluate(ast, &Scope::new(&probe, &host)) {
            return Ok(as_index(&Some(index))
                .and_then(|i| items.get(i))
                .map_or(Cursor::Absent, Cursor::One));
        }

        let mut kept = Vec::new();
        for item in items {
            let verdict = evaluate(ast, &Scope::new(item, &host)).map_err(|e| QueryError::Filter {
                path: self.path.to_string(),
                filter: source.to_string(),
                source: e,
            })?;
            if truthy(&verdict) {
                kept.push(Cursor::One(item));
            }
        }
        Ok(Cursor::Many(kept))
    }
}

/// Supplies `last()` to selector expressions
struct LastIndex(usize);

impl FunctionHost for LastIndex {
    fn call(
        &self,
        name: &str,
        _args: Vec<Option<Value>>,
        _scope: &Scope<'_>,
    ) -> Result<Option<Value>, ExpressionError> {
        match name {
            "last" => Ok(Some(Value::from(self.0))),
            other => Err(ExpressionError::UnknownFunction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> Value {
        json!({
            "a": 9,
            "b": {
                "c": [
                    { "e": 1, "d": [{ "e": 1 }, { "e": 2 }, { "e": 3 }] },
                    { "e": 2, "d": [{ "e": 4 }, { "e": 5 }, { "e": 6 }] },
                    { "e": 3, "d": [{ "e": 7 }, { "e": 8 }, { "e": 9 }] }
                ]
            }
        })
    }

    #[test]
    fn test_root_is_identity() {
        let input = json!({ "a": 1, "b": 2 });
        assert_eq!(query(&input, "/").unwrap(), Some(input.clone()));
        assert_eq!(query(&json!({}), "/").unwrap(), Some(json!({})));
    }

    #[test]
    fn test_missing_property_is_absent() {
        assert_eq!(query(&json!({ "a": 1, "b": 2 }), "/x").unwrap(), None);
        assert_eq!(query(&json!({ "a": 1 }), "/x/y").unwrap(), None);
    }

    #[test]
    fn test_missing_under_list_is_empty() {
        assert_eq!(query(&json!([]), "/x").unwrap(), Some(json!([])));
        assert_eq!(query(&json!({ "a": [1, 2, 3] }), "/a/x/y").unwrap(), Some(json!([])));
    }

    #[test]
    fn test_absent_root_is_empty_list() {
        let outcome = query_outcome(None, "/a").unwrap();
        assert_eq!(outcome.value, Some(json!([])));
        let outcome = query_outcome(Some(&Value::Null), "/a").unwrap();
        assert_eq!(outcome.value, Some(json!([])));
    }

    #[test]
    fn test_index_last_and_filter() {
        let input = json!({ "a": 9, "b": { "c": [1, 2, 3] } });
        assert_eq!(query(&input, "/b/c[1]").unwrap(), Some(json!(2)));
        assert_eq!(query(&input, "/b/c[last()]").unwrap(), Some(json!(3)));
        assert_eq!(query(&input, "/b/c[$this > 1]").unwrap(), Some(json!([2, 3])));
        assert_eq!(query(&input, "/b/c[7]").unwrap(), None);
    }

    #[test]
    fn test_nested_filters_flatten_before_next_property() {
        let result = query(&nested(), "/b/c[e>=2]/d[e>5]/e").unwrap();
        assert_eq!(result, Some(json!([6, 7, 8, 9])));
    }

    #[test]
    fn test_nested_filters_keep_grouping_at_end() {
        let input = json!({
            "b": { "c": [
                { "e": 1, "d": [1, 2, 3] },
                { "e": 2, "d": [4, 5, 6] },
                { "e": 3, "d": [7, 8, 9] }
            ] }
        });
        let result = query(&input, "/b/c[e >= 2]/d[$this > 5]").unwrap();
        assert_eq!(result, Some(json!([[6], [7, 8, 9]])));
    }

    #[test]
    fn test_enumeration() {
        let input = json!({ "prop": ["cde", "fgh"], "s": "x" });
        let outcome = query_outcome(Some(&input), "/prop[]").unwrap();
        assert!(outcome.enumerated);
        assert_eq!(outcome.value, Some(json!(["cde", "fgh"])));

        let outcome = query_outcome(Some(&input), "s[]").unwrap();
        assert_eq!(outcome.value, Some(json!([])));
    }

    #[test]
    fn test_chained_enumeration_filters_each_list() {
        let input = json!({ "a": [[{ "e": 1, "b": "x" }, { "e": 2, "b": "y" }], [{ "e": 3, "b": "z" }]] });
        let result = query(&input, "a[][e > 1]/b").unwrap();
        assert_eq!(result, Some(json!(["y", "z"])));
    }

    #[test]
    fn test_property_maps_over_list() {
        let input = json!({ "items": [{ "id": 1 }, { "id": 2 }, { "other": 3 }] });
        assert_eq!(query(&input, "items/id").unwrap(), Some(json!([1, 2])));
        assert_eq!(query(&input, "items.id").unwrap(), Some(json!([1, 2])));
    }

    #[test]
    fn test_quoted_property() {
        let input = json!({ "a.b": { "c": true } });
        assert_eq!(query(&input, "/'a.b'/c").unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_filter_on_non_list_is_absent() {
        let input = json!({ "a": { "x": 1 } });
        assert_eq!(query(&input, "/a[x > 0]").unwrap(), None);
        assert_eq!(query(&json!({ "a": [] }), "/a[x > 0]").unwrap(), Some(json!([])));
    }
}
