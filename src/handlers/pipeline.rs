// Pipeline handlers: dispatch requests to configured transform and redirect services

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, Uri},
    response::{IntoResponse, Json, Redirect, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use crate::domain::pattern::{resolve_pattern_with_data, ResolvedPattern};
use crate::domain::service::{Service, ServiceKind};
use crate::domain::transform;
use crate::domain::url_context::{QueryArgs, UrlContext};
use crate::domain::variables::VariableScope;
use crate::error::AppError;
use crate::AppState;

#[derive(Serialize)]
pub struct ServiceSummary {
    path: String,
    description: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    methods: Option<Vec<String>>,
}

impl From<&Service> for ServiceSummary {
    fn from(service: &Service) -> Self {
        ServiceSummary {
            path: service.path.clone(),
            description: service.description.clone(),
            kind: service.kind_name(),
            methods: (!service.methods.is_empty()).then(|| service.methods.clone()),
        }
    }
}

// GET /_services - configured services in configuration order
pub async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceSummary>> {
    Json(state.services.iter().map(ServiceSummary::from).collect())
}

// Fallback - every other request goes to the service with the longest matching base path
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Result<Response, AppError> {
    let service = state
        .services
        .find(uri.path())
        .ok_or_else(|| AppError::NotFound(format!("no service handles '{}'", uri.path())))?;

    if !service.allows(method.as_str()) {
        return Err(AppError::MethodNotAllowed(format!(
            "{} is not accepted by '{}'",
            method, service.path
        )));
    }

    let url = UrlContext::parse(&uri.to_string(), Some(&service.path))
        .map_err(|e| AppError::BadRequest(format!("Invalid request URL: {}", e)))?;
    debug!(service = %service.path, kind = service.kind_name(), path = %url.path, "dispatching request");

    match &service.kind {
        ServiceKind::Transform(spec) => run_transform(spec, &url, &body),
        ServiceKind::Redirect(pattern) => run_redirect(service, pattern, &url),
    }
}

fn run_transform(spec: &transform::TransformSpec, url: &UrlContext, body: &[u8]) -> Result<Response, AppError> {
    let input: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body)?
    };

    // fresh per request so concurrent requests never share bindings
    let mut variables = VariableScope::new();
    let output = transform::apply(spec, &input, url, None, &mut variables)?;
    Ok(Json(output.unwrap_or(Value::Null)).into_response())
}

fn run_redirect(service: &Service, pattern: &str, url: &UrlContext) -> Result<Response, AppError> {
    let data = query_data(&url.query);
    match resolve_pattern_with_data(pattern, url, &data)? {
        ResolvedPattern::Single(target) => {
            debug!(service = %service.path, target = %target, "redirecting");
            Ok(Redirect::to(&target).into_response())
        }
        ResolvedPattern::Multiple(targets) => Err(AppError::BadRequest(format!(
            "pattern for '{}' resolved to {} urls; a redirect needs exactly one",
            service.path,
            targets.len()
        ))),
    }
}

/// Query arguments as data: one value is a string, repeated values a list
fn query_data(query: &QueryArgs) -> Value {
    let fields: Map<String, Value> = query
        .iter()
        .map(|(key, values)| {
            let value = match values.as_slice() {
                [] => Value::String(String::new()),
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(fields)
}
