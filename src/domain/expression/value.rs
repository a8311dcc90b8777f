// Loose-typing rules shared by the evaluator and the helper functions
//
// `None` stands for an absent value throughout; `Some(Value::Null)` is an explicit null.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Convert a float into a JSON number, keeping integral values integral
pub fn from_f64(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

pub fn truthy(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

pub fn to_number(value: &Option<Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(items)) => match items.as_slice() {
            [] => 0.0,
            [single] => to_number(&Some(single.clone())),
            _ => f64::NAN,
        },
        Some(Value::Object(_)) => f64::NAN,
    }
}

/// Text form used for string concatenation, templates and URL substitution
pub fn to_text(value: &Option<Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(v) => value_text(v),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => format_float(f),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => value_text(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e21 {
        format!("{}", f as i128)
    } else {
        format!("{}", f)
    }
}

pub fn strict_equals(left: &Option<Value>, right: &Option<Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn loose_equals(left: &Option<Value>, right: &Option<Value>) -> bool {
    let is_nullish = |v: &Option<Value>| matches!(v, None | Some(Value::Null));
    if is_nullish(left) || is_nullish(right) {
        return is_nullish(left) && is_nullish(right);
    }
    match (left, right) {
        (Some(Value::String(a)), Some(Value::String(b))) => a == b,
        (Some(Value::Array(_) | Value::Object(_)), _) | (_, Some(Value::Array(_) | Value::Object(_))) => {
            strict_equals(left, right)
        }
        _ => to_number(left) == to_number(right),
    }
}

/// Ordering for relational operators: strings compare lexically, everything else numerically
pub fn compare(left: &Option<Value>, right: &Option<Value>) -> Option<Ordering> {
    match (left, right) {
        (Some(Value::String(a)), Some(Value::String(b))) => Some(a.cmp(b)),
        _ => to_number(left).partial_cmp(&to_number(right)),
    }
}

pub fn as_index(value: &Option<Value>) -> Option<usize> {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64()?,
        Some(Value::String(s)) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

/// Property read with scripting semantics: missing keys are absent, not errors
pub fn get_property(value: &Value, key: &str) -> Option<Value> {
    match value {
        Value::Object(map) => map.get(key).cloned(),
        Value::Array(items) => {
            if key == "length" {
                Some(Value::from(items.len()))
            } else {
                key.parse::<usize>().ok().and_then(|i| items.get(i).cloned())
            }
        }
        Value::String(s) => {
            if key == "length" {
                Some(Value::from(s.chars().count()))
            } else {
                key.parse::<usize>()
                    .ok()
                    .and_then(|i| s.chars().nth(i))
                    .map(|c| Value::String(c.to_string()))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_f64_keeps_integers_integral() {
        assert_eq!(from_f64(18.0), json!(18));
        assert_eq!(from_f64(1.5), json!(1.5));
        assert_eq!(from_f64(f64::NAN), Value::Null);
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&None));
        assert!(!truthy(&Some(json!(0))));
        assert!(!truthy(&Some(json!(""))));
        assert!(truthy(&Some(json!([]))));
        assert!(truthy(&Some(json!("0"))));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(to_text(&Some(json!(3))), "3");
        assert_eq!(to_text(&Some(json!(2.5))), "2.5");
        assert_eq!(to_text(&Some(json!([1, null, "a"]))), "1,,a");
        assert_eq!(to_text(&None), "undefined");
    }

    #[test]
    fn test_loose_equality() {
        assert!(loose_equals(&Some(json!("1")), &Some(json!(1))));
        assert!(loose_equals(&None, &Some(Value::Null)));
        assert!(!loose_equals(&Some(json!(0)), &None));
        assert!(!strict_equals(&Some(json!("1")), &Some(json!(1))));
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(compare(&Some(json!("abc")), &Some(json!("abd"))), Some(Ordering::Less));
        assert_eq!(compare(&Some(json!(2)), &Some(json!("10"))), Some(Ordering::Less));
        assert_eq!(compare(&None, &Some(json!(1))), None);
    }

    #[test]
    fn test_get_property_on_list() {
        let list = json!([1, 2, 3]);
        assert_eq!(get_property(&list, "length"), Some(json!(3)));
        assert_eq!(get_property(&list, "1"), Some(json!(2)));
        assert_eq!(get_property(&list, "x"), None);
    }
}
