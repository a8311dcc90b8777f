// Embedded expression language
//
// A small scripting-style expression language evaluated against JSON data:
// arithmetic, comparison, ternary, template strings and calls into a
// caller-supplied function namespace. Missing properties yield absent values.

mod ast;
mod evaluator;
mod parser;
pub mod value;

use serde_json::Value;
use thiserror::Error;

pub use ast::{BinaryOp, Expr, LogicalOp, TemplatePart, UnaryOp};
pub use evaluator::{evaluate, FunctionHost, NoFunctions, Scope};
pub use parser::ExpressionParser;

/// Expression errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Syntax error in expression '{expression}' at position {position}: {message}")]
    Syntax {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("Type error: {0}")]
    Type(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}

/// Parse and evaluate in one step
pub fn evaluate_str(expression: &str, scope: &Scope<'_>) -> Result<Option<Value>, ExpressionError> {
    let expr = ExpressionParser::parse(expression)?;
    evaluate(&expr, scope)
}
