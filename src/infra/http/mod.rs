pub mod api;
mod middleware;
mod server;

pub use api::{ApiState, build_api_router};
pub use middleware::{RequestContext, RequestDeadline};
pub use server::{ServeOutcome, serve_until};

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{FromRef, State};
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::get;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;
use crate::infra::error::InfraError;

/// Liveness of the entity store, as seen by `GET /healthz`.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn health_check(&self) -> Result<(), InfraError>;
}

#[async_trait]
impl StoreHealth for PostgresRepositories {
    async fn health_check(&self) -> Result<(), InfraError> {
        PostgresRepositories::health_check(self)
            .await
            .map_err(|err| InfraError::database(err.to_string()))
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<dyn StoreHealth>,
}

fn db_health_response(result: Result<(), InfraError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn healthz(State(state): State<HealthState>) -> Response {
    db_health_response(state.store.health_check().await)
}

#[derive(Clone)]
pub struct RouterState {
    pub api: ApiState,
    pub health: HealthState,
    pub deadline: RequestDeadline,
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

impl FromRef<RouterState> for HealthState {
    fn from_ref(state: &RouterState) -> Self {
        state.health.clone()
    }
}

impl FromRef<RouterState> for RequestDeadline {
    fn from_ref(state: &RouterState) -> Self {
        state.deadline
    }
}

/// Complete service router: RPC methods, health probe and the shared layers.
pub fn build_router(state: RouterState) -> Router {
    let deadline = state.deadline;

    build_api_router(state.clone())
        .merge(Router::new().route("/healthz", get(healthz)))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            deadline,
            middleware::enforce_deadline,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
