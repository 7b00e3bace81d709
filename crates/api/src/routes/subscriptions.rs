use crate::{
    error::ApiError,
    models::{CostQuery, CreateSubscriptionRequest, ListSubscriptionsQuery, UpdateSubscriptionRequest},
    state::AppState,
    validation::{validate_create_request, validate_update_request},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use services::subscription::{SubscriptionOutput, SubscriptionsPage};
use services::{RequestContext, SubscriptionId};

pub fn create_subscriptions_router() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions",
            get(list_subscriptions).post(create_subscription),
        )
        .route("/subscriptions/cost", get(subscriptions_cost))
        .route(
            "/subscriptions/{id}",
            get(get_subscription)
                .patch(update_subscription)
                .delete(delete_subscription),
        )
}

fn parse_subscription_id(ctx: &RequestContext, raw: &str) -> Result<SubscriptionId, ApiError> {
    raw.parse().map_err(|e| {
        tracing::warn!(request_id = %ctx, id = raw, error = ?e, "Invalid subscription ID");
        ApiError::invalid_subscription_id()
    })
}

/// Create a subscription
#[utoipa::path(
    post,
    path = "/subscriptions",
    tag = "Subscriptions",
    request_body = CreateSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription created", body = SubscriptionOutput),
        (status = 400, description = "Invalid input", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn create_subscription(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    payload: Result<Json<CreateSubscriptionRequest>, JsonRejection>,
) -> Result<Json<SubscriptionOutput>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(request_id = %ctx, "Failed to decode create subscription request");
        ApiError::invalid_json(rejection)
    })?;

    validate_create_request(&request).map_err(|msg| {
        tracing::warn!(request_id = %ctx, error = %msg, "Validation failed for create subscription");
        ApiError::bad_request(msg)
    })?;

    let subscription = app_state
        .subscription_service
        .create_subscription(&ctx, request.into())
        .await?;

    Ok(Json(subscription))
}

/// List subscriptions
///
/// Returns one page of subscriptions, optionally filtered by user and service.
#[utoipa::path(
    get,
    path = "/subscriptions",
    tag = "Subscriptions",
    params(ListSubscriptionsQuery),
    responses(
        (status = 200, description = "Page of subscriptions", body = SubscriptionsPage),
        (status = 400, description = "Invalid query parameters", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn list_subscriptions(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<ListSubscriptionsQuery>, QueryRejection>,
) -> Result<Json<SubscriptionsPage>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        tracing::warn!(request_id = %ctx, "Failed to decode subscription filter");
        ApiError::invalid_query(rejection)
    })?;

    let page = app_state
        .subscription_service
        .subscriptions(&ctx, query.into_params())
        .await?;

    Ok(Json(page))
}

/// Total cost of subscriptions
///
/// Sums `price * months` over every matching subscription's overlap with the
/// `from`..`to` window. Open-ended subscriptions count up to the current month.
#[utoipa::path(
    get,
    path = "/subscriptions/cost",
    tag = "Subscriptions",
    params(CostQuery),
    responses(
        (status = 200, description = "Total cost", body = i64),
        (status = 400, description = "Invalid query parameters", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn subscriptions_cost(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    query: Result<Query<CostQuery>, QueryRejection>,
) -> Result<Json<i64>, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        tracing::warn!(request_id = %ctx, "Failed to decode cost request");
        ApiError::invalid_query(rejection)
    })?;

    let total = app_state
        .subscription_service
        .subscriptions_cost(&ctx, query.into())
        .await?;

    Ok(Json(total))
}

/// Get a subscription by ID
#[utoipa::path(
    get,
    path = "/subscriptions/{id}",
    tag = "Subscriptions",
    params(("id" = String, Path, description = "Subscription ID (UUID)")),
    responses(
        (status = 200, description = "Subscription found", body = SubscriptionOutput),
        (status = 400, description = "Invalid subscription ID", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Subscription not found", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn get_subscription(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<Json<SubscriptionOutput>, ApiError> {
    let id = parse_subscription_id(&ctx, &id)?;

    let subscription = app_state
        .subscription_service
        .subscription_by_id(&ctx, id)
        .await?;

    Ok(Json(subscription))
}

/// Update a subscription
///
/// Only the supplied fields change. An empty body returns the current state.
#[utoipa::path(
    patch,
    path = "/subscriptions/{id}",
    tag = "Subscriptions",
    params(("id" = String, Path, description = "Subscription ID (UUID)")),
    request_body = UpdateSubscriptionRequest,
    responses(
        (status = 200, description = "Subscription updated", body = SubscriptionOutput),
        (status = 400, description = "Invalid input", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Subscription not found", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn update_subscription(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateSubscriptionRequest>, JsonRejection>,
) -> Result<Json<SubscriptionOutput>, ApiError> {
    let id = parse_subscription_id(&ctx, &id)?;

    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(request_id = %ctx, subscription_id = %id, "Failed to decode update request");
        ApiError::invalid_json(rejection)
    })?;

    validate_update_request(&request).map_err(|msg| {
        tracing::warn!(request_id = %ctx, subscription_id = %id, error = %msg, "Validation failed for update request");
        ApiError::bad_request(msg)
    })?;

    let subscription = app_state
        .subscription_service
        .update_subscription(&ctx, id, request.into())
        .await?;

    Ok(Json(subscription))
}

/// Delete a subscription
#[utoipa::path(
    delete,
    path = "/subscriptions/{id}",
    tag = "Subscriptions",
    params(("id" = String, Path, description = "Subscription ID (UUID)")),
    responses(
        (status = 204, description = "Subscription deleted"),
        (status = 400, description = "Invalid subscription ID", body = crate::error::ApiErrorResponse),
        (status = 404, description = "Subscription not found", body = crate::error::ApiErrorResponse),
        (status = 500, description = "Internal server error", body = crate::error::ApiErrorResponse)
    )
)]
pub async fn delete_subscription(
    State(app_state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_subscription_id(&ctx, &id)?;

    app_state
        .subscription_service
        .delete_subscription(&ctx, id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
