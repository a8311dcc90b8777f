pub mod config;
pub mod domain;
pub mod error;
pub mod handlers;

use axum::{routing::get, Router};
use domain::service::ServiceMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body
const MAX_BODY_BYTES: usize = 1024 * 1024;

// Application state
pub struct AppState {
    pub services: ServiceMap,
}

// Public function to create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/_services", get(handlers::pipeline::list_services))
        // Everything else is matched against the configured service paths
        .fallback(handlers::pipeline::dispatch)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
