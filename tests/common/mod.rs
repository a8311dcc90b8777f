// Common test utilities shared across test files

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use pipeshape::{config::services::parse_services, AppState};
use std::sync::Arc;

/// Create a test Axum router serving the services declared in `yml`
#[allow(dead_code)]
pub fn create_test_app(yml: &str) -> axum::Router {
    let services = parse_services(yml).expect("test services should load");
    pipeshape::create_router(Arc::new(AppState { services }))
}

/// Build a POST request carrying a JSON body
#[allow(dead_code)]
pub fn json_request(uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Collect a response body as JSON
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
