use services::subscription::SubscriptionService;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub subscription_service: Arc<dyn SubscriptionService>,
}
