use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;
use tracing::debug;

use crate::application::access::Metadata;

use super::error::ApiError;
use super::state::ApiState;

/// Run the access guard against the request path before any handler.
///
/// The resolved role is attached to the request, and to the response so outer
/// logging can see it.
pub async fn guard_access(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.uri().path().to_string();
    let metadata = metadata_from_headers(request.headers());

    let role = match state.guard.check(&method, Some(&metadata)) {
        Ok(role) => role,
        Err(denied) => {
            let access = state.guard.policy().classify(&method);
            counter!("bookshelf_access_denied_total").increment(1);
            debug!(
                method = %method,
                access = access.as_str(),
                reason = %denied,
                "call rejected by access guard"
            );
            return ApiError::from(denied).into_response();
        }
    };

    if let Some(role) = role.clone() {
        request.extensions_mut().insert(role);
    }

    let mut response = next.run(request).await;
    if let Some(role) = role {
        response.extensions_mut().insert(role);
    }
    response
}

/// Request headers as metadata. Values that are not valid visible ASCII are skipped.
pub fn metadata_from_headers(headers: &HeaderMap) -> Metadata {
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            metadata.insert(name.as_str(), value);
        }
    }
    metadata
}
