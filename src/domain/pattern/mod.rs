// URL pattern resolution
//
// Patterns combine positional path macros (`$>1`, `$B<0`, `$?(q)`, ...) with
// data tokens (`${path}`) looked up by the structural query engine.

mod data;
mod resolver;

use thiserror::Error;

use super::query::QueryError;

pub use data::{resolve_pattern_with_data, ResolvedPattern};
pub use resolver::resolve_pattern;

/// Data pattern errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("In pattern '{pattern}', the data path '{path}' is not present in the data")]
    MissingValue { pattern: String, path: String },

    #[error("In pattern '{pattern}', the data path '{path}' is {reason}, which cannot be placed in a URL")]
    Unusable {
        pattern: String,
        path: String,
        reason: String,
    },

    #[error("In pattern '{pattern}': {source}")]
    Query { pattern: String, source: QueryError },
}
