use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use bookshelf_api_types::{TIMEOUT_HEADER, methods};
use metrics::{counter, histogram};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{access::CallerRole, error::ErrorReport};

use super::api::error::ApiError;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Server-side upper bound on how long a single call may run.
#[derive(Debug, Clone, Copy)]
pub struct RequestDeadline(pub Duration);

impl RequestDeadline {
    /// The header may shorten the deadline, never extend it.
    pub fn effective(self, requested: Option<&str>) -> Duration {
        requested
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .map_or(self.0, |requested| requested.min(self.0))
    }
}

/// Drop the in-flight handler future once the deadline passes.
pub async fn enforce_deadline(
    State(deadline): State<RequestDeadline>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let limit = deadline.effective(
        request
            .headers()
            .get(TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok()),
    );

    match tokio::time::timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => ApiError::deadline_exceeded(limit).into_response(),
    }
}

fn metric_method_label(path: &str) -> &'static str {
    methods::ALL
        .iter()
        .copied()
        .find(|method| *method == path)
        .unwrap_or("other")
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed = start.elapsed();

    let rpc_method = metric_method_label(uri.path());
    counter!(
        "bookshelf_rpc_requests_total",
        "method" => rpc_method,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
    histogram!("bookshelf_rpc_duration_seconds", "method" => rpc_method)
        .record(elapsed.as_secs_f64());

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = elapsed.as_millis();
        let role = response
            .extensions()
            .get::<CallerRole>()
            .map(|role| role.as_str().to_string())
            .unwrap_or_default();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "bookshelf::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                role = role,
                "request failed",
            );
        } else {
            warn!(
                target = "bookshelf::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                role = role,
                "client request error",
            );
        }
    }

    response
}
