use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Subscriptions API",
        description = "Tracks users' recurring subscriptions and reports their combined cost.",
        version = "1.0.0",
        license(name = "MIT",)
    ),
    paths(
        crate::routes::health_check,
        crate::routes::subscriptions::create_subscription,
        crate::routes::subscriptions::list_subscriptions,
        crate::routes::subscriptions::subscriptions_cost,
        crate::routes::subscriptions::get_subscription,
        crate::routes::subscriptions::update_subscription,
        crate::routes::subscriptions::delete_subscription,
    ),
    components(schemas(
        crate::routes::HealthResponse,
        crate::models::CreateSubscriptionRequest,
        crate::models::UpdateSubscriptionRequest,
        services::subscription::SubscriptionOutput,
        services::subscription::SubscriptionsPage,
        crate::error::ApiErrorResponse,
    )),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Subscriptions", description = "Subscription management and cost reporting")
    )
)]
pub struct ApiDoc;
