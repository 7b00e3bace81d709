#![allow(dead_code)]

use api::{create_router, AppState};
use axum_test::TestServer;
use serde_json::{json, Value};
use services::subscription::test_helpers::InMemorySubscriptionRepository;
use services::subscription::{SubscriptionService, SubscriptionServiceImpl};
use std::sync::Arc;
use std::time::Duration;

pub const TEST_USER_ID: &str = "60601fee-2bf1-4721-ae6f-7636e79a0cba";

/// Test server plus a handle on the in-memory store behind it
pub struct TestContext {
    pub server: TestServer,
    pub repository: Arc<InMemorySubscriptionRepository>,
}

/// Create a test server wired to an in-memory repository
pub fn create_test_server() -> TestContext {
    let repository = Arc::new(InMemorySubscriptionRepository::new());
    let subscription_service = Arc::new(SubscriptionServiceImpl::new(repository.clone()));

    let app_state = AppState {
        subscription_service: subscription_service as Arc<dyn SubscriptionService>,
    };

    let server = TestServer::new(create_router(app_state, Duration::from_secs(10)))
        .expect("Failed to create test server");

    TestContext { server, repository }
}

pub fn subscription_body(service_name: &str, price: i32, start: &str, end: Option<&str>) -> Value {
    let mut body = json!({
        "service_name": service_name,
        "price": price,
        "user_id": TEST_USER_ID,
        "start_date": start,
    });
    if let Some(end) = end {
        body["end_date"] = json!(end);
    }
    body
}

/// Create a subscription for [`TEST_USER_ID`] and return the response body
pub async fn create_subscription(
    server: &TestServer,
    service_name: &str,
    price: i32,
    start: &str,
    end: Option<&str>,
) -> Value {
    let response = server
        .post("/subscriptions")
        .json(&subscription_body(service_name, price, start, end))
        .await;
    assert_eq!(response.status_code(), 200, "{}", response.text());
    response.json()
}
