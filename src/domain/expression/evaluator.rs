// Expression evaluation against a stack of data frames

use serde_json::{Map, Value};

use super::ast::{BinaryOp, Expr, LogicalOp, TemplatePart, UnaryOp};
use super::value::{
    as_index, compare, from_f64, get_property, loose_equals, strict_equals, to_number, to_text,
    truthy,
};
use super::ExpressionError;
use crate::domain::variables::VariableScope;

type Result<T> = std::result::Result<T, ExpressionError>;

/// Supplies the functions callable by bare name from an expression
pub trait FunctionHost {
    fn call(&self, name: &str, args: Vec<Option<Value>>, scope: &Scope<'_>) -> Result<Option<Value>>;
}

/// Host with no functions at all
pub struct NoFunctions;

impl FunctionHost for NoFunctions {
    fn call(&self, name: &str, _args: Vec<Option<Value>>, _scope: &Scope<'_>) -> Result<Option<Value>> {
        Err(ExpressionError::UnknownFunction(name.to_string()))
    }
}

/// Name resolution context: data frames (innermost last), variables and functions
pub struct Scope<'a> {
    frames: Vec<&'a Value>,
    variables: Option<&'a VariableScope>,
    functions: &'a dyn FunctionHost,
}

impl<'a> Scope<'a> {
    pub fn new(data: &'a Value, functions: &'a dyn FunctionHost) -> Self {
        Self {
            frames: vec![data],
            variables: None,
            functions,
        }
    }

    pub fn with_variables(mut self, variables: &'a VariableScope) -> Self {
        self.variables = Some(variables);
        self
    }

    /// A scope whose innermost frame is `data`, falling back to this scope's frames
    pub fn child<'b>(&'b self, data: &'b Value) -> Scope<'b>
    where
        'a: 'b,
    {
        let mut frames: Vec<&'b Value> = self.frames.iter().copied().collect();
        frames.push(data);
        Scope {
            frames,
            variables: self.variables,
            functions: self.functions,
        }
    }

    /// The innermost data frame (`$` / `$this`)
    pub fn data(&self) -> &'a Value {
        self.frames[self.frames.len() - 1]
    }

    /// The outermost data frame
    pub fn root(&self) -> &'a Value {
        self.frames[0]
    }

    pub fn variables(&self) -> Option<&'a VariableScope> {
        self.variables
    }

    pub fn functions(&self) -> &'a dyn FunctionHost {
        self.functions
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if name == "$" || name == "$this" {
            return Some(self.data().clone());
        }
        let from_frames = self
            .frames
            .iter()
            .rev()
            .find_map(|frame| frame.as_object().and_then(|map| map.get(name)));
        if let Some(value) = from_frames {
            return Some(value.clone());
        }
        self.variables
            .and_then(|variables| variables.get(name))
            .cloned()
    }
}

pub fn evaluate(expr: &Expr, scope: &Scope<'_>) -> Result<Option<Value>> {
    match expr {
        Expr::Literal(value) => Ok(Some(value.clone())),
        Expr::Undefined => Ok(None),
        Expr::Ident(name) => Ok(scope.lookup(name)),
        Expr::Member { object, property } => {
            let target = evaluate(object, scope)?;
            Ok(target.and_then(|t| get_property(&t, property)))
        }
        Expr::Index { object, index } => {
            let target = evaluate(object, scope)?;
            let key = evaluate(index, scope)?;
            Ok(match (target, key) {
                (Some(Value::Array(items)), key) => as_index(&key).and_then(|i| items.get(i).cloned()),
                (Some(target), Some(key)) => get_property(&target, &to_text(&Some(key))),
                _ => None,
            })
        }
        Expr::Call { callee, args } => evaluate_call(callee, args, scope),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, scope)?;
            Ok(Some(match op {
                UnaryOp::Not => Value::Bool(!truthy(&value)),
                UnaryOp::Negate => from_f64(-to_number(&value)),
                UnaryOp::Plus => from_f64(to_number(&value)),
            }))
        }
        Expr::Binary { op, left, right } => {
            let left = evaluate(left, scope)?;
            let right = evaluate(right, scope)?;
            Ok(Some(binary(*op, &left, &right)))
        }
        Expr::Logical { op, left, right } => {
            let left_value = evaluate(left, scope)?;
            let take_left = match op {
                LogicalOp::And => !truthy(&left_value),
                LogicalOp::Or => truthy(&left_value),
                LogicalOp::Nullish => !matches!(left_value, None | Some(Value::Null)),
            };
            if take_left {
                Ok(left_value)
            } else {
                evaluate(right, scope)
            }
        }
        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if truthy(&evaluate(test, scope)?) {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
        Expr::Array(items) => {
            let values = items
                .iter()
                .map(|item| Ok(evaluate(item, scope)?.unwrap_or(Value::Null)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Value::Array(values)))
        }
        Expr::Object(entries) => {
            let mut map = Map::new();
            for (key, value_expr) in entries {
                if let Some(value) = evaluate(value_expr, scope)? {
                    map.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(map)))
        }
        Expr::Template(parts) => {
            let mut text = String::new();
            for part in parts {
                match part {
                    TemplatePart::Literal(s) => text.push_str(s),
                    TemplatePart::Expr(e) => text.push_str(&to_text(&evaluate(e, scope)?)),
                }
            }
            Ok(Some(Value::String(text)))
        }
    }
}

fn evaluate_call(callee: &Expr, args: &[Expr], scope: &Scope<'_>) -> Result<Option<Value>> {
    let arg_values = args
        .iter()
        .map(|arg| evaluate(arg, scope))
        .collect::<Result<Vec<_>>>()?;

    match callee {
        Expr::Ident(name) => scope.functions().call(name, arg_values, scope),
        Expr::Member { object, property } => {
            if matches!(object.as_ref(), Expr::Ident(name) if name == "Math")
                && scope.lookup("Math").is_none()
            {
                return math_function(property, &arg_values);
            }
            match evaluate(object, scope)? {
                Some(target) => call_method(&target, property, &arg_values),
                None => Err(ExpressionError::Type(format!(
                    "cannot call '{}' on an absent value",
                    property
                ))),
            }
        }
        _ => Err(ExpressionError::Type("expression is not callable".to_string())),
    }
}

fn binary(op: BinaryOp, left: &Option<Value>, right: &Option<Value>) -> Value {
    use std::cmp::Ordering;

    let numeric = |f: fn(f64, f64) -> f64| from_f64(f(to_number(left), to_number(right)));
    match op {
        BinaryOp::Add => {
            let is_texty = |v: &Option<Value>| {
                matches!(v, Some(Value::String(_) | Value::Array(_) | Value::Object(_)))
            };
            if is_texty(left) || is_texty(right) {
                Value::String(to_text(left) + &to_text(right))
            } else {
                numeric(|a, b| a + b)
            }
        }
        BinaryOp::Sub => numeric(|a, b| a - b),
        BinaryOp::Mul => numeric(|a, b| a * b),
        BinaryOp::Div => numeric(|a, b| a / b),
        BinaryOp::Rem => numeric(|a, b| a % b),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNe => Value::Bool(!strict_equals(left, right)),
    }
}

fn math_function(name: &str, args: &[Option<Value>]) -> Result<Option<Value>> {
    let arg = |i: usize| to_number(args.get(i).unwrap_or(&None));
    let result = match name {
        "floor" => arg(0).floor(),
        "ceil" => arg(0).ceil(),
        "round" => (arg(0) + 0.5).floor(),
        "abs" => arg(0).abs(),
        "trunc" => arg(0).trunc(),
        "sign" => {
            let n = arg(0);
            if n == 0.0 || n.is_nan() { n } else { n.signum() }
        }
        "sqrt" => arg(0).sqrt(),
        "pow" => arg(0).powf(arg(1)),
        "min" => args.iter().map(to_number).fold(f64::INFINITY, f64::min),
        "max" => args.iter().map(to_number).fold(f64::NEG_INFINITY, f64::max),
        other => return Err(ExpressionError::UnknownFunction(format!("Math.{}", other))),
    };
    Ok(Some(from_f64(result)))
}

fn call_method(target: &Value, method: &str, args: &[Option<Value>]) -> Result<Option<Value>> {
    let text_arg = |i: usize| args.get(i).map(to_text).unwrap_or_default();

    let result = match (target, method) {
        (_, "toString") => Value::String(to_text(&Some(target.clone()))),
        (Value::String(s), "toUpperCase") => Value::String(s.to_uppercase()),
        (Value::String(s), "toLowerCase") => Value::String(s.to_lowercase()),
        (Value::String(s), "trim") => Value::String(s.trim().to_string()),
        (Value::String(s), "includes") => Value::Bool(s.contains(&text_arg(0))),
        (Value::String(s), "startsWith") => Value::Bool(s.starts_with(&text_arg(0))),
        (Value::String(s), "endsWith") => Value::Bool(s.ends_with(&text_arg(0))),
        (Value::String(s), "indexOf") => {
            let needle = text_arg(0);
            match s.find(&needle) {
                Some(byte_pos) => Value::from(s[..byte_pos].chars().count()),
                None => Value::from(-1),
            }
        }
        (Value::String(s), "split") => {
            let separator = text_arg(0);
            let parts: Vec<Value> = if separator.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(separator.as_str())
                    .map(|p| Value::String(p.to_string()))
                    .collect()
            };
            Value::Array(parts)
        }
        (Value::String(s), "replace") => Value::String(s.replacen(&text_arg(0), &text_arg(1), 1)),
        (Value::String(s), "slice") => {
            let chars: Vec<char> = s.chars().collect();
            let (start, end) = slice_bounds(chars.len(), args);
            Value::String(chars[start..end].iter().collect())
        }
        (Value::String(s), "concat") => {
            let mut out = s.clone();
            for arg in args {
                out.push_str(&to_text(arg));
            }
            Value::String(out)
        }
        (Value::Array(items), "includes") => {
            let needle = args.first().cloned().unwrap_or(None);
            Value::Bool(items.iter().any(|item| strict_equals(&Some(item.clone()), &needle)))
        }
        (Value::Array(items), "indexOf") => {
            let needle = args.first().cloned().unwrap_or(None);
            items
                .iter()
                .position(|item| strict_equals(&Some(item.clone()), &needle))
                .map(Value::from)
                .unwrap_or_else(|| Value::from(-1))
        }
        (Value::Array(items), "join") => {
            let separator = match args.first() {
                Some(Some(sep)) => to_text(&Some(sep.clone())),
                _ => ",".to_string(),
            };
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => to_text(&Some(other.clone())),
                })
                .collect();
            Value::String(parts.join(&separator))
        }
        (Value::Array(items), "slice") => {
            let (start, end) = slice_bounds(items.len(), args);
            Value::Array(items[start..end].to_vec())
        }
        (Value::Array(items), "concat") => {
            let mut out = items.clone();
            for arg in args.iter().flatten() {
                match arg {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        (Value::Number(_), "toFixed") => {
            let digits = args.first().map(to_number).filter(|d| !d.is_nan()).unwrap_or(0.0);
            if !(0.0..=100.0).contains(&digits) {
                return Err(ExpressionError::Type(format!(
                    "toFixed() digits must be between 0 and 100, got {}",
                    digits
                )));
            }
            let n = to_number(&Some(target.clone()));
            Value::String(format!("{:.*}", digits as usize, n))
        }
        _ => {
            return Err(ExpressionError::Type(format!(
                "'{}' is not a function on {}",
                method,
                type_name(target)
            )))
        }
    };
    Ok(Some(result))
}

/// Resolve `slice(start, end)` arguments with negative offsets counted from the end
fn slice_bounds(len: usize, args: &[Option<Value>]) -> (usize, usize) {
    let resolve = |arg: Option<&Option<Value>>, default: usize| -> usize {
        match arg {
            Some(Some(v)) => {
                let n = to_number(&Some(v.clone()));
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    (len as f64 + n).max(0.0) as usize
                } else {
                    (n as usize).min(len)
                }
            }
            _ => default,
        }
    };
    let start = resolve(args.first(), 0);
    let end = resolve(args.get(1), len);
    (start, end.max(start))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
