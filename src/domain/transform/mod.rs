// Transformation engine
//
// Interprets JSON-shaped transform specifications: expression strings,
// function-call lists, plain lists, and shape maps whose keys are output paths
// (with `[item]` / `{entry}` loops) or `$variable` bindings.

mod dates;
mod engine;
mod helpers;
mod output_path;
mod spec;

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;

use super::expression::ExpressionError;
use super::url_context::UrlContext;
use super::variables::VariableScope;

pub use engine::TransformEngine;
pub use helpers::{HelperFunction, HelperHost, HelperRegistry};
pub use output_path::{OutputPath, OutputSegment};
pub use spec::{CompiledExpr, Shape, ShapeEntry, TransformSpec};

/// Transform errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Error in transform expression '{expression}': {source}")]
    Expression {
        expression: String,
        source: ExpressionError,
    },

    #[error("Invalid output path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Invalid transform specification: {0}")]
    InvalidSpec(String),
}

/// Compile and apply `spec` to `input` in one call.
///
/// `name` is exposed to `pathPattern` as the `$N` section. Variable bindings
/// made by the spec are left in `variables`.
pub fn transform(
    spec: &Value,
    input: &Value,
    url: &UrlContext,
    name: Option<&str>,
    variables: &mut VariableScope,
) -> Result<Option<Value>, TransformError> {
    let helpers = HelperRegistry::shared();
    let compiled = TransformSpec::parse(spec, helpers)?;
    apply(&compiled, input, url, name, variables)
}

/// Apply an already compiled spec
pub fn apply(
    spec: &TransformSpec,
    input: &Value,
    url: &UrlContext,
    name: Option<&str>,
    variables: &mut VariableScope,
) -> Result<Option<Value>, TransformError> {
    let url = match name {
        Some(name) => Cow::Owned(url.clone().with_name(name)),
        None => Cow::Borrowed(url),
    };
    TransformEngine::new(HelperRegistry::shared(), &url, variables).run(spec, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(spec: Value, input: Value) -> Option<Value> {
        let mut variables = VariableScope::new();
        transform(&spec, &input, &UrlContext::default(), None, &mut variables).unwrap()
    }

    #[test]
    fn test_single_var() {
        assert_eq!(run(json!({ "q": "a" }), json!({ "a": 1, "b": 2 })), Some(json!({ "q": 1 })));
    }

    #[test]
    fn test_missing_leaf_is_omitted() {
        assert_eq!(run(json!({ "q": "n", "r": "a" }), json!({ "a": 1 })), Some(json!({ "r": 1 })));
    }

    #[test]
    fn test_syntax_error_names_expression() {
        let mut variables = VariableScope::new();
        let err = transform(
            &json!({ "q": "/abc/def" }),
            &json!({}),
            &UrlContext::default(),
            None,
            &mut variables,
        )
        .unwrap_err();
        assert!(matches!(err, TransformError::Expression { ref expression, .. } if expression == "/abc/def"));
    }

    #[test]
    fn test_name_feeds_path_pattern() {
        let mut variables = VariableScope::new();
        let out = transform(
            &json!({ "link": "pathPattern('files/$N*')" }),
            &Value::Null,
            &UrlContext::new("/"),
            Some("report.pdf"),
            &mut variables,
        )
        .unwrap();
        assert_eq!(out, Some(json!({ "link": "files/report.pdf" })));
    }
}
