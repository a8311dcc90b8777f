// Transform specifications, classified and compiled once before interpretation

use serde_json::Value;

use super::helpers::HelperRegistry;
use super::output_path::OutputPath;
use super::TransformError;
use crate::domain::expression::{Expr, ExpressionParser};

/// Keys whose value seeds the output instead of being written into it
const BASE_KEYS: [&str; 3] = ["$", "$this", "."];

/// Marks the first element of a list as a function call
const CALL_MARKER: &str = "()";

#[derive(Debug, Clone)]
pub struct CompiledExpr {
    pub source: String,
    pub ast: Expr,
}

impl CompiledExpr {
    pub fn compile(source: &str) -> Result<Self, TransformError> {
        let ast = ExpressionParser::parse(source).map_err(|e| TransformError::Expression {
            expression: source.to_string(),
            source: e,
        })?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }
}

#[derive(Debug, Clone)]
pub enum TransformSpec {
    /// Numbers, booleans and null stand for themselves
    Literal(Value),
    Expr(CompiledExpr),
    /// `["fn()", arg, ...]`, rebuilt into a single call expression
    Call {
        function: String,
        expression: CompiledExpr,
    },
    List(Vec<TransformSpec>),
    Shape(Shape),
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub base: Option<Box<TransformSpec>>,
    pub entries: Vec<ShapeEntry>,
}

#[derive(Debug, Clone)]
pub enum ShapeEntry {
    /// `$name`: store into the variable scope, not the output
    Bind { name: String, spec: TransformSpec },
    Write { path: OutputPath, spec: TransformSpec },
}

impl TransformSpec {
    pub fn parse(spec: &Value, helpers: &HelperRegistry) -> Result<Self, TransformError> {
        match spec {
            Value::String(source) => Ok(TransformSpec::Expr(CompiledExpr::compile(source)?)),
            Value::Array(items) => match call_name(items) {
                Some(function) => {
                    let source = call_source(items, helpers)?;
                    Ok(TransformSpec::Call {
                        function: function.to_string(),
                        expression: CompiledExpr::compile(&source)?,
                    })
                }
                None => items
                    .iter()
                    .map(|item| Self::parse(item, helpers))
                    .collect::<Result<Vec<_>, _>>()
                    .map(TransformSpec::List),
            },
            Value::Object(map) => {
                let mut base = None;
                let mut entries = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let spec = Self::parse(value, helpers)?;
                    if BASE_KEYS.contains(&key.as_str()) {
                        base = Some(Box::new(spec));
                    } else if is_binding(key) {
                        entries.push(ShapeEntry::Bind {
                            name: key.clone(),
                            spec,
                        });
                    } else {
                        let target = key.strip_prefix("$$").map_or(key.as_str(), |_| &key[1..]);
                        entries.push(ShapeEntry::Write {
                            path: OutputPath::parse(target)?,
                            spec,
                        });
                    }
                }
                Ok(TransformSpec::Shape(Shape { base, entries }))
            }
            literal => Ok(TransformSpec::Literal(literal.clone())),
        }
    }
}

/// `$name`, excluding `$key` and `$$escaped`
fn is_binding(key: &str) -> bool {
    key.starts_with('$') && !key.starts_with("$$") && key != "$key"
}

fn call_name(items: &[Value]) -> Option<&str> {
    match items.first() {
        Some(Value::String(marker)) => marker.strip_suffix(CALL_MARKER),
        _ => None,
    }
}

/// Rebuild `["fn()", a, b]` as the expression text `fn(a, b)`
fn call_source(items: &[Value], helpers: &HelperRegistry) -> Result<String, TransformError> {
    let function = call_name(items).unwrap_or_default();
    let expression_args = helpers
        .get(function)
        .map(|helper| helper.expression_args())
        .unwrap_or(&[]);

    let mut args = Vec::with_capacity(items.len().saturating_sub(1));
    for (position, arg) in items.iter().skip(1).enumerate() {
        let text = match arg {
            Value::Array(nested) if call_name(nested).is_some() => call_source(nested, helpers)?,
            Value::String(s) if expression_args.contains(&position) => {
                serde_json::to_string(s).map_err(|e| TransformError::InvalidSpec(e.to_string()))?
            }
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        args.push(text);
    }
    Ok(format!("{}({})", function, args.join(", ")))
}
