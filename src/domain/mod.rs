pub mod expression;
pub mod pattern;
pub mod query;
pub mod service;
pub mod transform;
pub mod url_context;
pub mod variables;
