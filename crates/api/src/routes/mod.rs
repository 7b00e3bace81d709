pub mod subscriptions;

use axum::{middleware::from_fn, routing::get, Json, Router};
use serde::Serialize;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer};
use utoipa::ToSchema;

use crate::{
    error::handle_panic,
    middleware::{http_logging_middleware, request_id_middleware},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// API version
    pub version: &'static str,
}

/// Health check endpoint
///
/// Returns the health status of the API service. This endpoint is typically used by
/// load balancers, monitoring systems, and orchestration tools to verify service availability.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Create the application router
pub fn create_router(app_state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .merge(subscriptions::create_subscriptions_router())
        .with_state(app_state);

    apply_layers(router, request_timeout)
}

/// Outermost first: request id, logging, panic recovery, timeout
fn apply_layers(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn(http_logging_middleware))
        .layer(from_fn(request_id_middleware))
}
