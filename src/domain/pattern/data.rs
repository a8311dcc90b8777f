// `${query}` substitution with cross-product multiplication over enumerated values

use std::collections::HashMap;

use serde_json::Value;

use super::{resolve_pattern, PatternError};
use crate::domain::expression::value::to_text;
use crate::domain::query::query_outcome;
use crate::domain::url_context::UrlContext;

/// A resolved data pattern: one string, or one per combination of enumerated values
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPattern {
    Single(String),
    Multiple(Vec<String>),
}

impl ResolvedPattern {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            ResolvedPattern::Single(s) => vec![s],
            ResolvedPattern::Multiple(all) => all,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PatternPart<'p> {
    Literal(&'p str),
    Data(&'p str),
}

/// Split into literal text and `${path}` tokens; a token ends at the first `}`
fn split_parts(text: &str) -> Vec<PatternPart<'_>> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("${") {
        let Some(close) = rest[open + 2..].find('}') else {
            break;
        };
        if open > 0 {
            parts.push(PatternPart::Literal(&rest[..open]));
        }
        parts.push(PatternPart::Data(&rest[open + 2..open + 2 + close]));
        rest = &rest[open + 2 + close + 1..];
    }
    if !rest.is_empty() {
        parts.push(PatternPart::Literal(rest));
    }
    parts
}

/// Resolve macros, then `${path}` tokens queried from `data`.
///
/// A token whose path enumerates with `[]` multiplies the pattern: one result per
/// value, combined across tokens in row-major order.
pub fn resolve_pattern_with_data(
    pattern: &str,
    url: &UrlContext,
    data: &Value,
) -> Result<ResolvedPattern, PatternError> {
    let resolved = resolve_pattern(pattern, url);

    let mut substitutions: HashMap<&str, Vec<String>> = HashMap::new();
    let mut multiplied = false;
    let mut results = vec![String::new()];

    for part in split_parts(&resolved) {
        match part {
            PatternPart::Literal(text) => results.iter_mut().for_each(|r| r.push_str(text)),
            PatternPart::Data(path) => {
                if !substitutions.contains_key(path) {
                    let (values, enumerated) = substitution_values(pattern, path, data)?;
                    multiplied |= enumerated;
                    substitutions.insert(path, values);
                }
                let values = &substitutions[path];
                results = results
                    .iter()
                    .flat_map(|prefix| values.iter().map(move |v| format!("{}{}", prefix, v)))
                    .collect();
            }
        }
    }

    if multiplied {
        Ok(ResolvedPattern::Multiple(results))
    } else {
        // without enumeration exactly one result exists
        Ok(ResolvedPattern::Single(results.into_iter().next().unwrap_or_default()))
    }
}

fn substitution_values(
    pattern: &str,
    path: &str,
    data: &Value,
) -> Result<(Vec<String>, bool), PatternError> {
    let outcome = query_outcome(Some(data), path).map_err(|source| PatternError::Query {
        pattern: pattern.to_string(),
        source,
    })?;

    if !outcome.enumerated {
        let text = scalar_text(pattern, path, outcome.value.as_ref())?;
        return Ok((vec![text], false));
    }

    let mut leaves = Vec::new();
    flatten_into(outcome.value, &mut leaves);
    let texts = leaves
        .iter()
        .map(|leaf| scalar_text(pattern, path, Some(leaf)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((texts, true))
}

fn flatten_into(value: Option<Value>, leaves: &mut Vec<Value>) {
    match value {
        Some(Value::Array(items)) => items.into_iter().for_each(|item| flatten_into(Some(item), leaves)),
        Some(other) => leaves.push(other),
        None => {}
    }
}

fn scalar_text(pattern: &str, path: &str, value: Option<&Value>) -> Result<String, PatternError> {
    let unusable = |reason: &str| PatternError::Unusable {
        pattern: pattern.to_string(),
        path: path.to_string(),
        reason: reason.to_string(),
    };
    match value {
        None | Some(Value::Null) => Err(PatternError::MissingValue {
            pattern: pattern.to_string(),
            path: path.to_string(),
        }),
        Some(Value::Object(_)) => Err(unusable("a map")),
        Some(Value::Array(_)) => Err(unusable("a list")),
        Some(Value::String(s)) if s.is_empty() => Err(unusable("an empty string")),
        Some(scalar) => Ok(to_text(&Some(scalar.clone()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(pattern: &str, data: Value) -> Result<ResolvedPattern, PatternError> {
        resolve_pattern_with_data(pattern, &UrlContext::new(""), &data)
    }

    #[test]
    fn test_single_prop() {
        let res = resolve("a/b/${prop}", json!({ "prop": "def" })).unwrap();
        assert_eq!(res, ResolvedPattern::Single("a/b/def".to_string()));
    }

    #[test]
    fn test_terminal_array() {
        let res = resolve("a/b/${prop[]}", json!({ "prop": ["cde", "fgh"] })).unwrap();
        assert_eq!(res.into_vec(), vec!["a/b/cde", "a/b/fgh"]);
    }

    #[test]
    fn test_non_terminal_array() {
        let data = json!({ "prop": [{ "q": 1, "inner": "xxx" }, { "q": 2, "inner": "yyy" }] });
        let res = resolve("a/b/${prop[].inner}", data).unwrap();
        assert_eq!(res, ResolvedPattern::Multiple(vec!["a/b/xxx".into(), "a/b/yyy".into()]));
    }

    #[test]
    fn test_cross_product_row_major() {
        let data = json!({ "prop": ["n", "m"], "prop2": ["x", "y"] });
        let res = resolve("a/b/${prop[]}/c/${prop2[]}", data).unwrap();
        assert_eq!(
            res.into_vec(),
            vec!["a/b/n/c/x", "a/b/n/c/y", "a/b/m/c/x", "a/b/m/c/y"]
        );
    }

    #[test]
    fn test_empty_enumeration_yields_nothing() {
        let res = resolve("a/${prop[]}", json!({ "prop": [] })).unwrap();
        assert_eq!(res, ResolvedPattern::Multiple(Vec::new()));
    }

    #[test]
    fn test_repeated_token_uses_one_value() {
        let res = resolve("${id}-${id}", json!({ "id": 7 })).unwrap();
        assert_eq!(res, ResolvedPattern::Single("7-7".to_string()));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let res = resolve("x/${a}", json!({ "a": "${b}", "b": "no" })).unwrap();
        assert_eq!(res, ResolvedPattern::Single("x/${b}".to_string()));
    }

    #[test]
    fn test_unusable_values() {
        assert!(matches!(
            resolve("a/${missing}", json!({})),
            Err(PatternError::MissingValue { .. })
        ));
        assert!(matches!(
            resolve("a/${n}", json!({ "n": null })),
            Err(PatternError::MissingValue { .. })
        ));
        assert!(matches!(
            resolve("a/${o}", json!({ "o": { "x": 1 } })),
            Err(PatternError::Unusable { .. })
        ));
        assert!(matches!(
            resolve("a/${l}", json!({ "l": [1] })),
            Err(PatternError::Unusable { .. })
        ));
        assert!(matches!(
            resolve("a/${s}", json!({ "s": "" })),
            Err(PatternError::Unusable { .. })
        ));
    }

    #[test]
    fn test_error_names_pattern_and_path() {
        let err = resolve("users/${id}", json!({})).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("users/${id}"));
        assert!(message.contains("'id'"));
    }

    #[test]
    fn test_macros_resolve_first() {
        let url = UrlContext::new("/orders/17");
        let res = resolve_pattern_with_data("api/$>1/${kind}", &url, &json!({ "kind": "lines" })).unwrap();
        assert_eq!(res, ResolvedPattern::Single("api/17/lines".to_string()));
    }
}
