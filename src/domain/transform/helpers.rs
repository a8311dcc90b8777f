// Helper functions callable from transform expressions

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::{Map, Value};

use super::dates::{format_date, new_date};
use super::engine::TransformEngine;
use super::spec::TransformSpec;
use super::TransformError;
use crate::domain::expression::value::{compare, from_f64, strict_equals, to_text, truthy};
use crate::domain::expression::{evaluate, Expr, ExpressionError, ExpressionParser, FunctionHost, Scope};
use crate::domain::pattern::{resolve_pattern, resolve_pattern_with_data, ResolvedPattern};
use crate::domain::query::query_outcome;
use crate::domain::url_context::UrlContext;

type Result<T> = std::result::Result<T, ExpressionError>;

/// A function in the transform helper namespace
pub trait HelperFunction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Argument positions that arrive as expression text to evaluate per item
    fn expression_args(&self) -> &'static [usize] {
        &[]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, url: &UrlContext) -> Result<Option<Value>>;
}

/// Registry of helper functions
pub struct HelperRegistry {
    helpers: HashMap<&'static str, Box<dyn HelperFunction>>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            helpers: HashMap::new(),
        };
        registry.register(Box::new(ExpressionMap));
        registry.register(Box::new(ExpressionFilter));
        registry.register(Box::new(ExpressionFind));
        registry.register(Box::new(ExpressionSort));
        registry.register(Box::new(ExpressionGroup));
        registry.register(Box::new(ExpressionExtreme::MIN));
        registry.register(Box::new(ExpressionExtreme::MAX));
        registry.register(Box::new(ExpressionReduce));
        registry.register(Box::new(TransformMap));
        registry.register(Box::new(Unique));
        registry.register(Box::new(Merge));
        registry.register(Box::new(NewDate));
        registry.register(Box::new(FormatDate));
        registry.register(Box::new(PathPattern));
        registry.register(Box::new(QueryPath));
        registry.register(Box::new(Literal));
        registry.register(Box::new(NewUuid));
        registry.register(Box::new(ParseInt));
        registry.register(Box::new(ParseFloat));
        registry
    }

    /// The process-wide default registry; helpers hold no mutable state
    pub fn shared() -> &'static HelperRegistry {
        static SHARED: OnceLock<HelperRegistry> = OnceLock::new();
        SHARED.get_or_init(HelperRegistry::new)
    }

    pub fn register(&mut self, helper: Box<dyn HelperFunction>) {
        self.helpers.insert(helper.name(), helper);
    }

    pub fn get(&self, name: &str) -> Option<&dyn HelperFunction> {
        self.helpers.get(name).map(|b| b.as_ref())
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Exposes a registry to expressions, bound to the URL of the current transform
pub struct HelperHost<'h> {
    registry: &'h HelperRegistry,
    url: &'h UrlContext,
}

impl<'h> HelperHost<'h> {
    pub fn new(registry: &'h HelperRegistry, url: &'h UrlContext) -> Self {
        Self { registry, url }
    }
}

impl FunctionHost for HelperHost<'_> {
    fn call(&self, name: &str, args: Vec<Option<Value>>, scope: &Scope<'_>) -> Result<Option<Value>> {
        let helper = self
            .registry
            .get(name)
            .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
        helper.call(&args, scope, self.url)
    }
}

fn arg(args: &[Option<Value>], index: usize) -> Option<&Value> {
    args.get(index).and_then(Option::as_ref)
}

/// Items of a list argument; anything that is not a list has none
fn list_items(value: Option<&Value>) -> &[Value] {
    match value {
        Some(Value::Array(items)) => items,
        _ => &[],
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Parse the per-item expression passed at `index`
fn item_expression(helper: &str, args: &[Option<Value>], index: usize) -> Result<Expr> {
    match arg(args, index) {
        Some(Value::String(text)) => ExpressionParser::parse(text),
        _ => Err(ExpressionError::Type(format!(
            "{} expects an expression string as argument {}",
            helper,
            index + 1
        ))),
    }
}

/// Evaluate with `item` as the innermost frame
fn eval_item(expr: &Expr, item: &Value, scope: &Scope<'_>) -> Result<Option<Value>> {
    evaluate(expr, &scope.child(item))
}

/// Total order used for sorting: absent/null, booleans, numbers, strings, then everything else
fn sort_order(a: &Option<Value>, b: &Option<Value>) -> Ordering {
    fn rank(value: &Option<Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

pub struct ExpressionMap;

impl HelperFunction for ExpressionMap {
    fn name(&self) -> &'static str {
        "expressionMap"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let expr = item_expression(self.name(), args, 1)?;
        let mapped = list_items(arg(args, 0))
            .iter()
            .map(|item| Ok(eval_item(&expr, item, scope)?.unwrap_or(Value::Null)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Value::Array(mapped)))
    }
}

pub struct ExpressionFilter;

impl HelperFunction for ExpressionFilter {
    fn name(&self) -> &'static str {
        "expressionFilter"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let expr = item_expression(self.name(), args, 1)?;
        let mut kept = Vec::new();
        for item in list_items(arg(args, 0)) {
            if truthy(&eval_item(&expr, item, scope)?) {
                kept.push(item.clone());
            }
        }
        Ok(Some(Value::Array(kept)))
    }
}

pub struct ExpressionFind;

impl HelperFunction for ExpressionFind {
    fn name(&self) -> &'static str {
        "expressionFind"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        if is_missing(arg(args, 0)) {
            return Ok(Some(Value::Null));
        }
        let expr = item_expression(self.name(), args, 1)?;
        for item in list_items(arg(args, 0)) {
            if truthy(&eval_item(&expr, item, scope)?) {
                return Ok(Some(item.clone()));
            }
        }
        Ok(None)
    }
}

/// `expressionSort(list, expression, 'desc'?)`, stable
pub struct ExpressionSort;

impl HelperFunction for ExpressionSort {
    fn name(&self) -> &'static str {
        "expressionSort"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        if is_missing(arg(args, 0)) {
            return Ok(Some(Value::Null));
        }
        let expr = item_expression(self.name(), args, 1)?;
        let descending = matches!(arg(args, 2), Some(Value::String(dir)) if dir == "desc");

        let mut keyed = list_items(arg(args, 0))
            .iter()
            .map(|item| Ok((eval_item(&expr, item, scope)?, item.clone())))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|(a, _), (b, _)| {
            let order = sort_order(a, b);
            if descending {
                order.reverse()
            } else {
                order
            }
        });
        Ok(Some(Value::Array(keyed.into_iter().map(|(_, item)| item).collect())))
    }
}

/// `expressionGroup(list, expression)`: map of key text to the items sharing it
pub struct ExpressionGroup;

impl HelperFunction for ExpressionGroup {
    fn name(&self) -> &'static str {
        "expressionGroup"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let expr = item_expression(self.name(), args, 1)?;
        let mut groups = Map::new();
        for item in list_items(arg(args, 0)) {
            let key = to_text(&eval_item(&expr, item, scope)?);
            if let Value::Array(members) = groups.entry(key).or_insert_with(|| Value::Array(Vec::new())) {
                members.push(item.clone());
            }
        }
        Ok(Some(Value::Object(groups)))
    }
}

/// `expressionMin` / `expressionMax`: extreme of the evaluated values
pub struct ExpressionExtreme {
    name: &'static str,
    wanted: Ordering,
}

impl ExpressionExtreme {
    const MIN: Self = Self {
        name: "expressionMin",
        wanted: Ordering::Less,
    };
    const MAX: Self = Self {
        name: "expressionMax",
        wanted: Ordering::Greater,
    };
}

impl HelperFunction for ExpressionExtreme {
    fn name(&self) -> &'static str {
        self.name
    }

    fn expression_args(&self) -> &'static [usize] {
        &[1]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let expr = item_expression(self.name, args, 1)?;
        let mut best: Option<Value> = None;
        for item in list_items(arg(args, 0)) {
            let candidate = eval_item(&expr, item, scope)?;
            if matches!(candidate, None | Some(Value::Null)) {
                continue;
            }
            if best.is_none() || compare(&candidate, &best) == Some(self.wanted) {
                best = candidate;
            }
        }
        Ok(best)
    }
}

/// `expressionReduce(list, init, expression)`: the accumulator is `$`, item properties are in scope
pub struct ExpressionReduce;

impl HelperFunction for ExpressionReduce {
    fn name(&self) -> &'static str {
        "expressionReduce"
    }

    fn expression_args(&self) -> &'static [usize] {
        &[2]
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let init = args.get(1).cloned().flatten();
        if is_missing(arg(args, 0)) {
            return Ok(init);
        }
        let expr = item_expression(self.name(), args, 2)?;
        let mut accumulator = init;
        for item in list_items(arg(args, 0)) {
            let partial = accumulator.take().unwrap_or(Value::Null);
            let item_scope = scope.child(item);
            accumulator = evaluate(&expr, &item_scope.child(&partial))?;
        }
        Ok(accumulator)
    }
}

/// `transformMap(list, transformObject)`: applies a nested transform to each item,
/// with the item's fields laid over the transform input
pub struct TransformMap;

impl HelperFunction for TransformMap {
    fn name(&self) -> &'static str {
        "transformMap"
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, url: &UrlContext) -> Result<Option<Value>> {
        let spec = match arg(args, 1) {
            Some(spec) => TransformSpec::parse(spec, HelperRegistry::shared()).map_err(nested_failure)?,
            None => {
                return Err(ExpressionError::Type(
                    "transformMap expects a transform object as argument 2".to_string(),
                ))
            }
        };

        let data = scope.root();
        let mut results = Vec::new();
        for item in list_items(arg(args, 0)) {
            // outer bindings are readable, nested bindings stay local to the item
            let mut variables = scope.variables().cloned().unwrap_or_default();
            let input = overlay(data, item);
            let output = TransformEngine::new(HelperRegistry::shared(), url, &mut variables)
                .run(&spec, &input)
                .map_err(nested_failure)?;
            results.push(output.unwrap_or(Value::Null));
        }
        Ok(Some(Value::Array(results)))
    }
}

/// `item`'s fields over those of `data`; an item that is not an object stands alone
fn overlay(data: &Value, item: &Value) -> Value {
    match (data, item) {
        (Value::Object(base), Value::Object(fields)) => {
            let mut merged = base.clone();
            merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            Value::Object(merged)
        }
        _ => item.clone(),
    }
}

fn nested_failure(err: TransformError) -> ExpressionError {
    match err {
        TransformError::Expression { source, .. } => source,
        other => ExpressionError::Evaluation(format!("transformMap: {}", other)),
    }
}

pub struct Unique;

impl HelperFunction for Unique {
    fn name(&self) -> &'static str {
        "unique"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let mut seen: Vec<Value> = Vec::new();
        for item in list_items(arg(args, 0)) {
            if !seen.iter().any(|s| strict_equals(&Some(s.clone()), &Some(item.clone()))) {
                seen.push(item.clone());
            }
        }
        Ok(Some(Value::Array(seen)))
    }
}

/// Shallow union of maps, later arguments win
pub struct Merge;

impl HelperFunction for Merge {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let mut merged = Map::new();
        for object in args.iter().flatten().filter_map(Value::as_object) {
            merged.extend(object.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(Some(Value::Object(merged)))
    }
}

pub struct NewDate;

impl HelperFunction for NewDate {
    fn name(&self) -> &'static str {
        "newDate"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        new_date(args)
    }
}

pub struct FormatDate;

impl HelperFunction for FormatDate {
    fn name(&self) -> &'static str {
        "formatDate"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        format_date(args)
    }
}

/// `pathPattern(pattern, decode?)` against the transform's URL and input data
pub struct PathPattern;

impl HelperFunction for PathPattern {
    fn name(&self) -> &'static str {
        "pathPattern"
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, url: &UrlContext) -> Result<Option<Value>> {
        let pattern = to_text(&args.first().cloned().flatten());
        let decode = truthy(&args.get(1).cloned().flatten());
        let decoded = |text: String| {
            if decode {
                urlencoding::decode(&text)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| text.clone())
            } else {
                text
            }
        };

        let data = scope.root();
        let resolved = if data.is_null() {
            ResolvedPattern::Single(resolve_pattern(&pattern, url))
        } else {
            resolve_pattern_with_data(&pattern, url, data)
                .map_err(|e| ExpressionError::Evaluation(e.to_string()))?
        };

        Ok(Some(match resolved {
            ResolvedPattern::Single(text) => Value::String(decoded(text)),
            ResolvedPattern::Multiple(all) => {
                Value::Array(all.into_iter().map(|text| Value::String(decoded(text))).collect())
            }
        }))
    }
}

/// `path(queryPath, value?)`: structural query, defaulting to the transform input
pub struct QueryPath;

impl HelperFunction for QueryPath {
    fn name(&self) -> &'static str {
        "path"
    }

    fn call(&self, args: &[Option<Value>], scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let path = to_text(&args.first().cloned().flatten());
        let target = if args.len() < 2 { Some(scope.root()) } else { arg(args, 1) };
        query_outcome(target, &path)
            .map(|outcome| outcome.value)
            .map_err(|e| ExpressionError::Evaluation(e.to_string()))
    }
}

pub struct Literal;

impl HelperFunction for Literal {
    fn name(&self) -> &'static str {
        "literal"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        Ok(args.first().cloned().flatten())
    }
}

pub struct NewUuid;

impl HelperFunction for NewUuid {
    fn name(&self) -> &'static str {
        "newUuid"
    }

    fn call(&self, _args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        Ok(Some(Value::String(uuid::Uuid::new_v4().to_string())))
    }
}

/// `parseInt(text, radix?)`: leading integer digits, null when there are none
pub struct ParseInt;

impl HelperFunction for ParseInt {
    fn name(&self) -> &'static str {
        "parseInt"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let text = to_text(&args.first().cloned().flatten());
        let radix = match arg(args, 1) {
            Some(Value::Number(n)) => n.as_u64().map(|r| r as u32),
            _ => None,
        };
        Ok(Some(parse_int_prefix(&text, radix).map_or(Value::Null, from_f64)))
    }
}

fn parse_int_prefix(text: &str, radix: Option<u32>) -> Option<f64> {
    let text = text.trim_start();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    let hex_prefix = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .filter(|_| matches!(radix, None | Some(16)));
    let (radix, digits) = match (hex_prefix, radix) {
        (Some(rest), _) => (16, rest),
        (None, Some(r)) if (2..=36).contains(&r) => (r, text),
        (None, Some(_)) => return None,
        (None, None) => (10, text),
    };

    let mut value = 0f64;
    let mut any = false;
    for digit in digits.chars().map_while(|c| c.to_digit(radix)) {
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    any.then_some(if negative { -value } else { value })
}

/// `parseFloat(text)`: longest leading decimal number, null when there is none
pub struct ParseFloat;

impl HelperFunction for ParseFloat {
    fn name(&self) -> &'static str {
        "parseFloat"
    }

    fn call(&self, args: &[Option<Value>], _scope: &Scope<'_>, _url: &UrlContext) -> Result<Option<Value>> {
        let text = to_text(&args.first().cloned().flatten());
        Ok(Some(parse_float_prefix(&text).map_or(Value::Null, from_f64)))
    }
}

fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut last_valid = if int_end > end { Some(int_end) } else { None };
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        if frac_end > end + 1 || last_valid.is_some() {
            last_valid = Some(frac_end);
        }
        end = frac_end;
    }

    if last_valid.is_some() && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            last_valid = Some(exp_end);
        }
    }

    last_valid.and_then(|end| text[..end].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expression::evaluate_str;
    use serde_json::json;

    fn eval(text: &str, data: &Value) -> Option<Value> {
        let url = UrlContext::new("/orders/17").with_query(crate::domain::url_context::parse_query("q=1"));
        let host = HelperHost::new(HelperRegistry::shared(), &url);
        evaluate_str(text, &Scope::new(data, &host)).unwrap()
    }

    #[test]
    fn test_registry() {
        let registry = HelperRegistry::new();
        assert!(registry.get("expressionMap").is_some());
        assert_eq!(registry.get("expressionReduce").map(|h| h.expression_args()), Some(&[2usize][..]));
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_unknown_helper() {
        let url = UrlContext::default();
        let host = HelperHost::new(HelperRegistry::shared(), &url);
        let err = evaluate_str("nope()", &Scope::new(&Value::Null, &host)).unwrap_err();
        assert_eq!(err, ExpressionError::UnknownFunction("nope".to_string()));
    }

    #[test]
    fn test_list_helpers() {
        let data = json!({ "xs": [3, 1, 2], "factor": 10 });
        assert_eq!(eval("expressionMap(xs, '$ * factor')", &data), Some(json!([30, 10, 20])));
        assert_eq!(eval("expressionFilter(xs, '$ > 1')", &data), Some(json!([3, 2])));
        assert_eq!(eval("expressionFind(xs, '$ < 3')", &data), Some(json!(1)));
        assert_eq!(eval("expressionFind(xs, '$ > 9')", &data), None);
        assert_eq!(eval("expressionSort(xs, '$')", &data), Some(json!([1, 2, 3])));
        assert_eq!(eval("expressionSort(xs, '$', 'desc')", &data), Some(json!([3, 2, 1])));
        assert_eq!(eval("expressionMin(xs, '$this')", &data), Some(json!(1)));
        assert_eq!(eval("expressionMax(xs, '$this * 2')", &data), Some(json!(6)));
        assert_eq!(eval("expressionReduce(xs, 0, '$ + factor')", &data), Some(json!(30)));
    }

    #[test]
    fn test_reduce_sees_item_properties() {
        let data = json!({ "items": [{ "n": 1 }, { "n": 2 }, { "n": 4 }] });
        assert_eq!(eval("expressionReduce(items, 0, '$ + n')", &data), Some(json!(7)));
        assert_eq!(eval("expressionReduce(missing, 5, '$ + n')", &data), Some(json!(5)));
    }

    #[test]
    fn test_transform_map_overlays_items_on_input() {
        let data = json!({ "currency": "EUR", "items": [{ "a": 1 }, { "a": 2, "currency": "USD" }] });
        assert_eq!(
            eval(r#"transformMap(items, { "n": "a * 10", "c": "currency" })"#, &data),
            Some(json!([{ "n": 10, "c": "EUR" }, { "n": 20, "c": "USD" }]))
        );
        assert_eq!(eval(r#"transformMap(missing, { "n": "a" })"#, &data), Some(json!([])));
    }

    #[test]
    fn test_transform_map_reports_nested_errors() {
        let url = UrlContext::default();
        let host = HelperHost::new(HelperRegistry::shared(), &url);
        let data = json!({ "items": [{ "a": 1 }] });
        let scope = Scope::new(&data, &host);
        let err = evaluate_str(r#"transformMap(items, { "n": "nope(a)" })"#, &scope).unwrap_err();
        assert_eq!(err, ExpressionError::UnknownFunction("nope".to_string()));
        assert!(matches!(evaluate_str("transformMap(items)", &scope), Err(ExpressionError::Type(_))));
    }

    #[test]
    fn test_group() {
        let data = json!([{ "a": 1, "b": 2 }, { "a": 1, "b": 3 }, { "a": 2, "b": 4 }]);
        assert_eq!(
            eval("expressionGroup($this, 'a')", &data),
            Some(json!({ "1": [{ "a": 1, "b": 2 }, { "a": 1, "b": 3 }], "2": [{ "a": 2, "b": 4 }] }))
        );
    }

    #[test]
    fn test_unique_merge_literal() {
        let data = json!({ "x": ["abc", "abd", "abc"], "p": { "a": 1, "b": 1 }, "q": { "b": 2 } });
        assert_eq!(eval("unique(x)", &data), Some(json!(["abc", "abd"])));
        assert_eq!(eval("merge(p, q)", &data), Some(json!({ "a": 1, "b": 2 })));
        assert_eq!(eval("literal(x)", &data), Some(json!(["abc", "abd", "abc"])));
    }

    #[test]
    fn test_number_parsing() {
        let data = json!({ "b": "2", "h": "0x1F", "f": "3.5kg", "bad": "abc" });
        assert_eq!(eval("parseInt(b)", &data), Some(json!(2)));
        assert_eq!(eval("parseInt(h)", &data), Some(json!(31)));
        assert_eq!(eval("parseInt('101', 2)", &data), Some(json!(5)));
        assert_eq!(eval("parseInt(bad)", &data), Some(Value::Null));
        assert_eq!(eval("parseFloat(f)", &data), Some(json!(3.5)));
        assert_eq!(eval("parseFloat('-1e3x')", &data), Some(json!(-1000)));
        assert_eq!(eval("parseFloat(bad)", &data), Some(Value::Null));
    }

    #[test]
    fn test_path_and_path_pattern() {
        let data = json!({ "a": [{ "x": 1 }, { "x": 2 }, { "x": 3 }], "ids": [4, 5] });
        assert_eq!(eval("path('/a[last()]/x', $this)", &data), Some(json!(3)));
        assert_eq!(eval("path('/a/x')", &data), Some(json!([1, 2, 3])));
        assert_eq!(eval("pathPattern('items/$>1')", &data), Some(json!("items/17")));
        assert_eq!(
            eval("pathPattern('items/${ids[]}?$?*')", &data),
            Some(json!(["items/4?q=1", "items/5?q=1"]))
        );
        assert_eq!(eval("pathPattern('a%20b', true)", &data), Some(json!("a b")));
    }

    #[test]
    fn test_new_uuid() {
        let id = eval("newUuid()", &Value::Null).and_then(|v| v.as_str().map(str::to_string));
        assert!(id.is_some_and(|id| uuid::Uuid::parse_str(&id).is_ok()));
    }
}
